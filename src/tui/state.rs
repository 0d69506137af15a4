use crate::model::{Entry, SessionState};
use crate::storage::{self, ExperimentFile};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::path::PathBuf;

pub const TAB_NOTEBOOK: usize = 0;
pub const TAB_EXPERIMENTS: usize = 1;
pub const TAB_HELP: usize = 2;
pub const TAB_COUNT: usize = 3;

/// What the input line currently feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Note,
    Title,
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub storage_dir: PathBuf,

    // Mirrors the session owned by the controller.
    pub session_state: SessionState,
    pub title: Option<String>,
    pub current_path: Option<PathBuf>,
    pub elapsed: String,
    pub transcript: String,
    pub entries: usize,

    pub input: String,
    pub input_mode: InputMode,

    pub experiments: Vec<ExperimentFile>,
    pub experiments_selected: usize, // Index of selected experiment (0 = most recent)
    pub experiments_scroll_offset: usize,
    pub detail_view: bool,
    pub detail_text: String,
    pub detail_scroll: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_NOTEBOOK,
            info: String::new(),
            storage_dir: PathBuf::new(),
            session_state: SessionState::Idle,
            title: None,
            current_path: None,
            elapsed: "00:00".to_string(),
            transcript: String::new(),
            entries: 0,
            input: String::new(),
            input_mode: InputMode::Note,
            experiments: Vec::new(),
            experiments_selected: 0,
            experiments_scroll_offset: 0,
            detail_view: false,
            detail_text: String::new(),
            detail_scroll: 0,
        }
    }
}

impl UiState {
    pub fn is_running(&self) -> bool {
        self.session_state == SessionState::Running
    }

    pub fn begin_title_prompt(&mut self) {
        self.tab = TAB_NOTEBOOK;
        self.input_mode = InputMode::Title;
        self.input.clear();
        self.info = "Enter a title for the new experiment".into();
    }

    pub fn cancel_title_prompt(&mut self) {
        self.input_mode = InputMode::Note;
        self.input.clear();
        self.info.clear();
    }

    pub fn on_started(&mut self, title: String, path: PathBuf, header: String) {
        self.session_state = SessionState::Running;
        self.info = format!("Recording to {}", path.display());
        self.title = Some(title);
        self.current_path = Some(path);
        self.transcript = header;
        self.entries = 0;
        self.elapsed = "00:00".into();
    }

    pub fn on_entry(&mut self, entry: &Entry) {
        self.transcript
            .push_str(&storage::entry_chunk(&entry.label, &entry.note));
        self.entries += 1;
    }

    pub fn on_stopped(&mut self, elapsed: &str) {
        self.session_state = SessionState::Idle;
        self.elapsed = elapsed.to_string();
    }

    /// Replace the experiments listing, keeping the selection in range.
    pub fn set_experiments(&mut self, experiments: Vec<ExperimentFile>) {
        self.experiments = experiments;
        if self.experiments.is_empty() {
            self.experiments_selected = 0;
            self.experiments_scroll_offset = 0;
        } else if self.experiments_selected >= self.experiments.len() {
            self.experiments_selected = self.experiments.len() - 1;
        }
        if self.experiments_scroll_offset > self.experiments_selected {
            self.experiments_scroll_offset = self.experiments_selected;
        }
    }

    pub fn refresh_experiments(&mut self) {
        let old_count = self.experiments.len();
        match storage::list_experiments(&self.storage_dir) {
            Ok(list) => {
                let new_count = list.len();
                self.set_experiments(list);
                self.info = if new_count > old_count {
                    format!("Refreshed: {} new experiment(s)", new_count - old_count)
                } else {
                    "Refreshed".into()
                };
            }
            Err(e) => {
                self.info = format!("Refresh failed: {e:#}");
            }
        }
    }

    pub fn select_prev(&mut self) {
        if self.experiments_selected > 0 {
            self.experiments_selected -= 1;
            if self.experiments_selected < self.experiments_scroll_offset {
                self.experiments_scroll_offset = self.experiments_selected;
            }
        }
    }

    pub fn select_next(&mut self, visible: usize) {
        if self.experiments_selected + 1 < self.experiments.len() {
            self.experiments_selected += 1;
            let visible = visible.max(1);
            if self.experiments_selected >= self.experiments_scroll_offset + visible {
                self.experiments_scroll_offset = self.experiments_selected + 1 - visible;
            }
        }
    }

    pub fn selected_experiment(&self) -> Option<&ExperimentFile> {
        self.experiments.get(self.experiments_selected)
    }

    pub fn toggle_detail(&mut self) {
        if self.detail_view {
            self.detail_view = false;
            return;
        }
        let Some(path) = self.selected_experiment().map(|e| e.path.clone()) else {
            return;
        };
        match storage::read_experiment(&path) {
            Ok(text) => {
                self.detail_text = text;
                self.detail_scroll = 0;
                self.detail_view = true;
            }
            Err(e) => {
                self.info = format!("Open failed: {e:#}");
            }
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(stem: &str) -> ExperimentFile {
        ExperimentFile {
            path: PathBuf::from(format!("/tmp/{stem}.txt")),
            stem: stem.to_string(),
            header: None,
            entries: 0,
        }
    }

    #[test]
    fn transcript_mirrors_file_layout() {
        let mut s = UiState::default();
        s.on_started(
            "T".into(),
            "/tmp/x.txt".into(),
            "Date: 01/03/2024 09:00:00\nTitle: T\n".into(),
        );
        s.on_entry(&Entry {
            label: "01:05".into(),
            note: "a".into(),
        });
        s.on_entry(&Entry {
            label: "02:10".into(),
            note: "b".into(),
        });
        assert_eq!(
            s.transcript,
            "Date: 01/03/2024 09:00:00\nTitle: T\n\n01:05: a\n02:10: b"
        );
        assert_eq!(s.entries, 2);
        assert!(s.is_running());
        s.on_stopped("02:30");
        assert!(!s.is_running());
        assert_eq!(s.elapsed, "02:30");
    }

    #[test]
    fn selection_stays_in_range() {
        let mut s = UiState::default();
        s.set_experiments(vec![fake("c"), fake("b"), fake("a")]);
        s.select_next(2);
        s.select_next(2);
        s.select_next(2);
        assert_eq!(s.experiments_selected, 2);
        assert_eq!(s.experiments_scroll_offset, 1);
        s.set_experiments(vec![fake("c")]);
        assert_eq!(s.experiments_selected, 0);
        assert_eq!(s.experiments_scroll_offset, 0);
        s.select_prev();
        assert_eq!(s.experiments_selected, 0);
    }

    #[test]
    fn wraps_long_values() {
        let mut out = Vec::new();
        push_wrapped_status_kv(&mut out, "File", &"x".repeat(50), 24);
        assert!(out.len() > 1);
        push_wrapped_status_kv(&mut out, "Empty", "  ", 24);
        assert!(out.len() > 1);
    }
}
