//! Time provider abstraction.
//!
//! Session expiry is judged against a [`Clock`] so that production code reads
//! the system time while tests can freeze and advance time explicitly.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// A source of "now", in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> i64;

    fn now_secs(&self) -> i64 {
        self.now_millis().div_euclid(1000)
    }
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Start at the given epoch second.
    pub fn at_secs(secs: i64) -> Self {
        Self::new(secs * 1000)
    }

    pub fn advance_millis(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_millis(secs * 1000);
    }

    pub fn set_millis(&self, ms: i64) {
        self.millis.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
