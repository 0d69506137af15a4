use std::time::Instant;
use time::{OffsetDateTime, UtcOffset};

/// Time source for the session engine.
///
/// `monotonic` drives elapsed-time labels and must never go backwards.
/// `wall` is only used for the human-readable header and the file name.
pub trait Clock: Send + Sync {
    fn monotonic(&self) -> Instant;
    fn wall(&self) -> OffsetDateTime;
}

/// Real clock. The local offset is resolved once at startup, before any
/// worker threads exist, because `time` refuses to read it afterwards on Unix.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Resolve the local UTC offset, falling back to UTC when it is indeterminate.
    pub fn local() -> Self {
        Self::new(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use super::Clock;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use time::OffsetDateTime;

    /// Clock that only moves when told to. Both readings advance together.
    pub struct ManualClock {
        base_instant: Instant,
        base_wall: OffsetDateTime,
        advanced: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new(base_wall: OffsetDateTime) -> Self {
            Self {
                base_instant: Instant::now(),
                base_wall,
                advanced: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.advanced.lock().unwrap() += by;
        }

        fn offset(&self) -> Duration {
            *self.advanced.lock().unwrap()
        }
    }

    impl Clock for ManualClock {
        fn monotonic(&self) -> Instant {
            self.base_instant + self.offset()
        }

        fn wall(&self) -> OffsetDateTime {
            self.base_wall + self.offset()
        }
    }
}
