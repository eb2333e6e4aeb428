//! # Cross-Platform Abstractions
//!
//! Wall-clock access and shared defaults. Cache expiry is computed in epoch
//! milliseconds, so the time source is a small [`Clock`] trait that tests can swap for
//! a [`ManualClock`].

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

// Cross-platform time imports
#[cfg(not(target_family = "wasm"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_family = "wasm")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Cross-platform time utilities
pub mod time {
    use super::*;

    /// Get current timestamp in milliseconds since Unix epoch
    pub fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Convert a duration to whole milliseconds, saturating at `u64::MAX`
    pub fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A source of "now" in epoch milliseconds.
pub trait Clock: Debug + Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        time::now_millis()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        self.now
            .fetch_add(time::duration_millis(duration), Ordering::SeqCst);
    }

    /// Jump to an absolute epoch-millisecond instant
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Cross-platform configuration
pub mod config {
    use super::*;

    /// TTL used by `cache_promise` when the caller does not give one
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Page size of a fresh paginated list
    pub const DEFAULT_PAGE_SIZE: usize = 20;

    /// Page size used when refreshing the head of an infinite list
    pub const REFRESH_PAGE_SIZE: usize = 50;

    /// Page numbering starts at 1
    pub const FIRST_PAGE: u32 = 1;
}

pub use config::*;
/// Re-export commonly used platform functions
pub use time::{duration_millis, now_millis};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_millis(), 1_250);

        let shared = clock.clone();
        shared.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(SystemClock.now_millis() > 0);
    }

    #[test]
    fn test_duration_millis_saturates() {
        assert_eq!(duration_millis(Duration::from_secs(2)), 2_000);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }
}
