//! Time sources for `created_at` / `updated_at`.

use complysync_protocol::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of monotonically increasing timestamps.
pub trait Clock: Send + Sync {
    /// Returns a timestamp strictly greater than every earlier one from this
    /// clock.
    fn now(&self) -> Timestamp;
}

/// Wall clock, forced monotonic.
///
/// If the wall clock stalls or steps backwards the clock keeps counting from
/// its last value, so two local writes never share an `updated_at`.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Timestamp::now().as_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Timestamp::from_millis(next),
                Err(actual) => last = actual,
            }
        }
    }
}

/// A clock driven by the test.
///
/// Every call to `now` advances the clock by one millisecond after returning
/// the current value, so it is monotonic without manual steps.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock starting at `start` milliseconds.
    #[must_use]
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jumps to `millis`.
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Moves forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// The value the next `now` call returns.
    #[must_use]
    pub fn peek(&self) -> Timestamp {
        Timestamp::from_millis(self.now.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.fetch_add(1, Ordering::SeqCst))
    }
}
