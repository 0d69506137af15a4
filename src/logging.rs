//! Diagnostic logging to a file.
//!
//! The TUI owns the terminal and text mode owns stdout, so logs never go to
//! the console. Filter with `LABBOOK_LOG` (default `info`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "labbook.log";

fn resolve_path(log_file: Option<&Path>) -> PathBuf {
    log_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| crate::storage::log_dir().join(LOG_FILE_NAME))
}

/// Split a log path into its directory and file name. A bare file name
/// lives in the current directory.
fn split_location(path: &Path) -> Option<(PathBuf, OsString)> {
    let file_name = path.file_name()?.to_os_string();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, file_name))
}

/// Open `path` for appending. `None` if the directory cannot be created or
/// the file cannot be opened (e.g. it is a directory).
fn open_appender(path: &Path) -> Option<RollingFileAppender> {
    let (dir, file_name) = split_location(path)?;
    std::fs::create_dir_all(&dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(&dir)
        .ok()
}

/// Install the global subscriber. Logging is silently disabled when the
/// log file cannot be opened. Keep the guard alive until exit.
pub fn init(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let appender = open_appender(&resolve_path(log_file))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("LABBOOK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_log_file_wins() {
        assert_eq!(
            resolve_path(Some(Path::new("/tmp/x/lab.log"))),
            PathBuf::from("/tmp/x/lab.log")
        );
        assert!(resolve_path(None).ends_with("labbook/labbook.log"));
    }

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        let (dir, name) = split_location(Path::new("lab.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, OsString::from("lab.log"));
    }

    #[test]
    fn unopenable_log_path_disables_logging() {
        let tmp = TempDir::new().unwrap();
        assert!(open_appender(tmp.path()).is_none());

        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        assert!(open_appender(&blocker.join("lab.log")).is_none());
    }

    #[test]
    fn opens_log_file_creating_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("lab.log");
        assert!(open_appender(&path).is_some());
        assert!(path.is_file());
    }
}
