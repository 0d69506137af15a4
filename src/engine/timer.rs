//! Elapsed-time tracking for the running experiment.

use super::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Format a duration as `MM:SS`, truncated to whole seconds.
///
/// Minutes are not capped at 59 and there is no hours field, so long
/// sessions produce labels like `125:03`.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Measures time since an origin taken from a monotonic clock.
pub struct ElapsedTimer {
    clock: Arc<dyn Clock>,
    origin: Option<Instant>,
    ticking: bool,
}

impl ElapsedTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            origin: None,
            ticking: false,
        }
    }

    /// Record the current instant as origin. Calling again restarts.
    pub fn start(&mut self) {
        self.origin = Some(self.clock.monotonic());
        self.ticking = true;
    }

    /// Halt the display refresh signal. The origin is kept.
    pub fn stop(&mut self) {
        self.ticking = false;
    }

    /// Whether presentation layers should keep refreshing the label.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn elapsed_duration(&self) -> Duration {
        match self.origin {
            Some(origin) => self.clock.monotonic().saturating_duration_since(origin),
            None => Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> String {
        format_elapsed(self.elapsed_duration())
    }
}
