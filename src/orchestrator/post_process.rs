//! Post-stop processing.
//!
//! Refreshes the experiments listing after a session ends so presentation
//! layers can show the new file.

use crate::model::ExperimentSummary;
use crate::storage::{self, ExperimentFile};
use std::path::Path;

/// Result of post-stop processing, ready for presentation layers.
pub(crate) struct ProcessedStop {
    pub message: String,
    pub experiments: Vec<ExperimentFile>,
}

pub(crate) fn process_stop(storage_dir: &Path, summary: &ExperimentSummary) -> ProcessedStop {
    let message = format!(
        "Stopped \"{}\" after {} with {} entr{} ({})",
        summary.title,
        summary.elapsed,
        summary.entries.len(),
        if summary.entries.len() == 1 { "y" } else { "ies" },
        summary.path.display()
    );
    let experiments = match storage::list_experiments(storage_dir) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "failed to refresh experiments");
            Vec::new()
        }
    };
    ProcessedStop {
        message,
        experiments,
    }
}
