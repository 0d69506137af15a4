//! Experiment files on disk.
//!
//! Naming, header layout, and the read side used by the experiments browser.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const APP_DIR_NAME: &str = "labbook";
const EXTENSION: &str = "txt";

const FILE_STEM_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");
const HEADER_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");

/// `~/labbook`, or `./labbook` when the home directory cannot be determined.
pub fn default_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
}

/// Directory for diagnostic logs, kept apart from experiment files.
pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// `YYYY-MM-DD-HH-MM-SS` for the given start time.
pub fn file_stem_for(ts: OffsetDateTime) -> io::Result<String> {
    ts.format(FILE_STEM_FORMAT).map_err(io::Error::other)
}

/// Two header lines, each newline-terminated.
pub fn header_for(ts: OffsetDateTime, title: &str) -> io::Result<String> {
    let date = ts.format(HEADER_DATE_FORMAT).map_err(io::Error::other)?;
    Ok(format!("Date: {date}\nTitle: {title}\n"))
}

/// Entry as appended to the file: a leading newline, then `label: note`.
pub fn entry_chunk(label: &str, note: &str) -> String {
    format!("\n{label}: {note}")
}

/// Create a new experiment file named after `stem`.
///
/// Never overwrites: if `<stem>.txt` exists, `<stem>-2.txt`, `<stem>-3.txt`
/// and so on are tried.
pub fn create_experiment_file(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 1u32;
    loop {
        let name = if attempt == 1 {
            format!("{stem}.{EXTENSION}")
        } else {
            format!("{stem}-{attempt}.{EXTENSION}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => return Ok((path, f)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 1000 => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Header fields recovered from an experiment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub date: Option<PrimitiveDateTime>,
    pub title: String,
}

pub fn parse_header(text: &str) -> Option<Header> {
    let mut lines = text.lines();
    let date_raw = lines.next()?.strip_prefix("Date: ")?;
    let title = lines.next()?.strip_prefix("Title: ")?;
    Some(Header {
        date: PrimitiveDateTime::parse(date_raw.trim(), HEADER_DATE_FORMAT).ok(),
        title: title.to_string(),
    })
}

/// Number of note lines after the header block.
pub fn count_entries(text: &str) -> usize {
    text.lines()
        .skip(2)
        .filter(|l| !l.trim().is_empty())
        .count()
}

/// A past experiment found in the storage directory.
#[derive(Debug, Clone)]
pub struct ExperimentFile {
    pub path: PathBuf,
    pub stem: String,
    pub header: Option<Header>,
    pub entries: usize,
}

impl ExperimentFile {
    pub fn display_title(&self) -> &str {
        self.header
            .as_ref()
            .map(|h| h.title.as_str())
            .unwrap_or("(no title)")
    }

    pub fn display_date(&self) -> String {
        self.header
            .as_ref()
            .and_then(|h| h.date)
            .and_then(|d| {
                d.format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))
                .ok()
            })
            .unwrap_or_else(|| self.stem.clone())
    }
}

/// All experiment files in `dir`, newest first. A missing directory is empty.
pub fn list_experiments(dir: &Path) -> Result<Vec<ExperimentFile>> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };

    let mut out = Vec::new();
    for ent in rd {
        let ent = ent.with_context(|| format!("read {}", dir.display()))?;
        let path = ent.path();
        if path.extension().and_then(|s| s.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        // Unreadable files are skipped; the listing is best effort.
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        out.push(ExperimentFile {
            header: parse_header(&text),
            entries: count_entries(&text),
            path,
            stem,
        });
    }
    // Stems are timestamps, so lexical order is chronological.
    out.sort_by(|a, b| b.stem.cmp(&a.stem));
    Ok(out)
}

pub fn read_experiment(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Hand the directory to the platform file browser.
pub fn open_in_file_browser(dir: &Path) -> Result<()> {
    ensure_dir(dir).with_context(|| format!("create {}", dir.display()))?;
    let program = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    std::process::Command::new(program)
        .arg(dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("launch {program}"))?;
    Ok(())
}
