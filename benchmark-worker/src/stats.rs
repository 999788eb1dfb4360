//! Elapsed-time statistics for a running benchmark server
//!
//! The only mutable state a server carries after startup is the instant of the
//! last reset. Readers take a shared lock to compute elapsed wall time, a reset
//! takes the exclusive lock to move the instant forward.

use crate::proto::ServerStats;
use parking_lot::RwLock;
use std::time::Instant;

/// Snapshot returned by [`ResetClock::stats`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Wall clock seconds since the last reset
    pub time_elapsed: f64,
    /// User CPU seconds since the last reset (not collected, always 0)
    pub time_user: f64,
    /// System CPU seconds since the last reset (not collected, always 0)
    pub time_system: f64,
}

impl From<Stats> for ServerStats {
    fn from(stats: Stats) -> Self {
        ServerStats {
            time_elapsed: stats.time_elapsed,
            time_user: stats.time_user,
            time_system: stats.time_system,
        }
    }
}

/// Last-reset instant guarded by a read-write lock
///
/// `Instant` is monotonic, so the guarded value never moves backwards and the
/// elapsed time is never negative.
#[derive(Debug)]
pub struct ResetClock {
    last_reset: RwLock<Instant>,
}

impl ResetClock {
    pub fn new() -> Self {
        Self {
            last_reset: RwLock::new(Instant::now()),
        }
    }

    pub fn stats(&self) -> Stats {
        let last_reset = self.last_reset.read();
        Stats {
            time_elapsed: last_reset.elapsed().as_secs_f64(),
            time_user: 0.0,
            time_system: 0.0,
        }
    }

    pub fn reset(&self) {
        let mut last_reset = self.last_reset.write();
        *last_reset = Instant::now();
    }
}

impl Default for ResetClock {
    fn default() -> Self {
        Self::new()
    }
}
