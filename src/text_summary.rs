//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for text mode and `--list`.

use crate::model::ExperimentSummary;
use crate::storage::ExperimentFile;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Summarize one finished experiment.
pub(crate) fn build_text_summary(summary: &ExperimentSummary) -> TextSummary {
    let mut lines = Vec::new();
    lines.push(format!("Experiment: {}", summary.title));
    lines.push(format!("Started: {}", summary.started_at));
    lines.push(format!("File: {}", summary.path.display()));
    lines.push(format!("Duration: {}", summary.elapsed));
    lines.push(format!("Entries: {}", summary.entries.len()));
    TextSummary { lines }
}

/// One line per past experiment, newest first.
pub(crate) fn build_listing(experiments: &[ExperimentFile]) -> TextSummary {
    if experiments.is_empty() {
        return TextSummary {
            lines: vec!["No experiments yet.".to_string()],
        };
    }
    let lines = experiments
        .iter()
        .map(|e| {
            format!(
                "{}  {:>4} entries  {}  ({})",
                e.display_date(),
                e.entries,
                e.display_title(),
                e.path.display()
            )
        })
        .collect();
    TextSummary { lines }
}
