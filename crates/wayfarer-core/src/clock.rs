//! Wall-clock abstraction.
//!
//! Token expiry and provider assertion caching both compare against "now" in
//! epoch seconds. Components take an `Arc<dyn Clock>` so tests can pin or
//! advance time deterministically instead of sleeping.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time in Unix epoch seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time as whole seconds since the Unix epoch.
    fn now_secs(&self) -> i64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock pinned at `now_secs`.
    pub fn new(now_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(now_secs),
        }
    }

    /// Pin the clock at `now_secs`.
    pub fn set(&self, now_secs: i64) {
        self.now.store(now_secs, Ordering::SeqCst);
    }

    /// Move the clock forward (or backward, for negative values).
    pub fn advance(&self, secs: i64) {
        let _ = self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
