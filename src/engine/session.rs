//! Experiment session lifecycle: start, add entries, stop.
//!
//! The in-memory log and the experiment file move in lock-step. An entry is
//! pushed to the log only after its bytes reached the file.

use super::clock::Clock;
use super::error::{Result, SessionError};
use super::timer::ElapsedTimer;
use crate::model::{Entry, ExperimentSummary, SessionState};
use crate::storage;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub storage_dir: PathBuf,
}

/// Open experiment file plus the number of bytes known to be in it.
struct Output {
    file: File,
    len: u64,
}

impl Output {
    /// Write and flush `bytes`. On failure the file is cut back to its
    /// previous length so a partial entry does not linger.
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let res = self
            .file
            .write_all(bytes)
            .and_then(|_| self.file.flush());
        match res {
            Ok(()) => {
                self.len += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                let _ = self.file.set_len(self.len);
                let _ = self.file.seek(SeekFrom::Start(self.len));
                Err(e)
            }
        }
    }

    fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

pub struct ExperimentSession {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    timer: ElapsedTimer,
    state: SessionState,
    title: String,
    started_at: Option<OffsetDateTime>,
    header: String,
    path: Option<PathBuf>,
    output: Option<Output>,
    log: Vec<Entry>,
}

impl ExperimentSession {
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            timer: ElapsedTimer::new(clock.clone()),
            config,
            clock,
            state: SessionState::Idle,
            title: String::new(),
            started_at: None,
            header: String::new(),
            path: None,
            output: None,
            log: Vec::new(),
        }
    }

    /// Begin a new experiment, stopping the current one first if needed.
    ///
    /// The title is taken as given; prompting for a non-empty one is up to
    /// the caller. Returns the path of the new experiment file.
    pub fn start(&mut self, title: &str) -> Result<PathBuf> {
        if self.is_running() {
            self.stop()?;
        }

        let dir = self.config.storage_dir.clone();
        let started_at = self.clock.wall();

        storage::ensure_dir(&dir).map_err(|e| SessionError::storage(&dir, e))?;
        let stem = storage::file_stem_for(started_at).map_err(|e| SessionError::write(&dir, e))?;
        let header =
            storage::header_for(started_at, title).map_err(|e| SessionError::write(&dir, e))?;

        let (path, file) = storage::create_experiment_file(&dir, &stem)
            .map_err(|e| SessionError::write(dir.join(format!("{stem}.txt")), e))?;
        let mut output = Output { file, len: 0 };
        if let Err(e) = output.append(header.as_bytes()) {
            drop(output);
            // A file without its header is not a valid experiment.
            let _ = std::fs::remove_file(&path);
            return Err(SessionError::write(path, e));
        }

        self.title = title.to_string();
        self.started_at = Some(started_at);
        self.header = header;
        self.path = Some(path.clone());
        self.output = Some(output);
        self.log.clear();
        self.timer.start();
        self.state = SessionState::Running;
        Ok(path)
    }

    /// Append a note stamped with the current elapsed label.
    ///
    /// Returns `Ok(None)` without touching anything when no experiment is
    /// running. On a write failure the log is left unchanged and the session
    /// keeps running.
    pub fn add_entry(&mut self, note: &str) -> Result<Option<Entry>> {
        let Some(output) = self.output.as_mut() else {
            return Ok(None);
        };

        let entry = Entry {
            label: self.timer.elapsed(),
            note: note.trim().to_string(),
        };
        let chunk = storage::entry_chunk(&entry.label, &entry.note);
        if let Err(e) = output.append(chunk.as_bytes()) {
            let path = self.path.clone().unwrap_or_default();
            return Err(SessionError::write(path, e));
        }

        self.log.push(entry.clone());
        Ok(Some(entry))
    }

    /// Flush and close the experiment file. Does nothing when idle.
    ///
    /// The file handle is released and the state is `Idle` even when the
    /// final flush fails; the failure is still returned.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == SessionState::Idle {
            return Ok(());
        }
        self.timer.stop();
        self.state = SessionState::Idle;

        if let Some(output) = self.output.take() {
            output.close().map_err(|e| {
                SessionError::write(self.path.clone().unwrap_or_default(), e)
            })?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn is_ticking(&self) -> bool {
        self.timer.is_ticking()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn log(&self) -> &[Entry] {
        &self.log
    }

    pub fn elapsed(&self) -> String {
        self.timer.elapsed()
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Header plus entries, byte-for-byte what the file holds.
    #[cfg(test)]
    pub fn transcript(&self) -> String {
        let mut out = self.header.clone();
        for e in &self.log {
            out.push_str(&storage::entry_chunk(&e.label, &e.note));
        }
        out
    }

    /// Snapshot of the current or last experiment; `None` before the first start.
    pub fn summary(&self) -> Option<ExperimentSummary> {
        let started_at = self.started_at?;
        Some(ExperimentSummary {
            title: self.title.clone(),
            started_at: started_at
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "unknown".into()),
            path: self.path.clone().unwrap_or_default(),
            elapsed: self.timer.elapsed(),
            entries: self.log.clone(),
        })
    }
}

impl Drop for ExperimentSession {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
