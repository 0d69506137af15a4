//! Drives an `ExperimentSession` on behalf of the TUI.
//!
//! The controller task owns the session and turns `UiCommand`s into
//! `SessionEvent`s; `process_stop` builds the status text and refreshed
//! listing shown once an experiment ends.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::process_stop;
