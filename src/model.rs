use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_dir: PathBuf,
    pub title: Option<String>,
    pub tick_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
}

/// One timestamped note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub note: String,
}

impl Entry {
    /// The line as it appears in the experiment file, without the leading newline.
    pub fn line(&self) -> String {
        format!("{}: {}", self.label, self.note)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub title: String,
    pub started_at: String,
    pub path: PathBuf,
    pub elapsed: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started {
        title: String,
        path: PathBuf,
        header: String,
    },
    EntryAdded(Entry),
    Stopped {
        summary: Box<ExperimentSummary>,
    },
    Tick {
        elapsed: String,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the controller and consumed by UI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Failed(String),
    IgnoredWhileIdle,
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Failed(msg) => format!("Error: {msg}"),
            InfoEvent::IgnoredWhileIdle => {
                "No experiment running. Press Ctrl-N to start one.".to_string()
            }
        }
    }
}
