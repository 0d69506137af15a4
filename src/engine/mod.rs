//! Experiment session engine.
//!
//! Plain synchronous methods with no UI types; presentation layers call
//! `start`, `add_entry` and `stop` and render what comes back.

mod clock;
mod error;
mod session;
mod timer;

pub use clock::{Clock, SystemClock};
pub use session::{ExperimentSession, SessionConfig};
