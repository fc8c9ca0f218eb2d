//! Injectable wall clock.
//!
//! Session TTLs and rate-limit windows are wall-clock driven; tests inject
//! a manual source instead of sleeping.

use std::sync::Arc;

/// Seconds since the Unix epoch.
pub type EpochSeconds = f64;

/// Source of wall-clock time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> EpochSeconds;
}

/// Default time source using system time.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> EpochSeconds {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Manually advanced clock for tests.
pub struct ManualTimeSource {
    now: parking_lot::Mutex<EpochSeconds>,
}

impl ManualTimeSource {
    pub fn new(start: EpochSeconds) -> Arc<Self> {
        Arc::new(Self {
            now: parking_lot::Mutex::new(start),
        })
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> EpochSeconds {
        *self.now.lock()
    }
}
