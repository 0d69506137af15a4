//! Error types for the session engine.

use std::path::PathBuf;

/// Failures surfaced by [`ExperimentSession`](super::ExperimentSession).
///
/// Calling `add_entry` while idle is not an error; it is a no-op.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("storage directory unavailable: {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write experiment file: {path}: {source}")]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::OutputWriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
