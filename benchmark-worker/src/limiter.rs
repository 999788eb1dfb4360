//! Process-wide core limit
//!
//! A benchmark server is started with a core limit taken from its configuration.
//! The limit is not scoped to that server: it is recorded once for the whole process
//! and every listener started afterwards sizes its worker pool from it.
//!
//! The resolver only sees the [`RuntimeLimiter`] trait, so tests can inject a
//! limiter that records calls instead of touching process state.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 0 means no limit has been applied yet
static CORE_LIMIT: AtomicUsize = AtomicUsize::new(0);

/// Applies a resolved core limit
pub trait RuntimeLimiter: Send + Sync {
    fn apply(&self, cores: NonZeroUsize);
}

/// Limiter backed by the process-wide setting read by the transport layer
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalCoreLimit;

impl RuntimeLimiter for GlobalCoreLimit {
    fn apply(&self, cores: NonZeroUsize) {
        let previous = CORE_LIMIT.swap(cores.get(), Ordering::SeqCst);
        if previous != 0 && previous != cores.get() {
            tracing::debug!("Core limit changed from {} to {}", previous, cores);
        }
    }
}

/// Number of worker threads a newly started listener should use
///
/// Falls back to the machine's available parallelism until a limit is applied.
pub fn current_core_limit() -> NonZeroUsize {
    NonZeroUsize::new(CORE_LIMIT.load(Ordering::SeqCst)).unwrap_or_else(|| {
        std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_limit_is_visible_process_wide() {
        let cores = NonZeroUsize::new(3).unwrap();
        GlobalCoreLimit.apply(cores);
        assert_eq!(current_core_limit(), cores);

        // Visible from any thread
        let seen = std::thread::spawn(current_core_limit).join().unwrap();
        assert_eq!(seen, cores);
    }
}
