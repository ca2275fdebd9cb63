//! Flush cadence.

use std::time::Duration;

/// Decides whether pending mutations should be flushed now.
///
/// The store consults the trigger after every mutation and from the
/// background task; tests drive it directly with synthetic durations.
pub trait FlushTrigger: Send + Sync {
    fn should_flush(&self, pending_mutations: u64, since_last_flush: Duration) -> bool;
}

/// Elapsed-time-or-mutation-count policy, whichever fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub interval: Duration,
    pub mutation_threshold: u64,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            mutation_threshold: 2,
        }
    }
}

impl FlushTrigger for FlushPolicy {
    fn should_flush(&self, pending_mutations: u64, since_last_flush: Duration) -> bool {
        if pending_mutations == 0 {
            return false;
        }
        pending_mutations >= self.mutation_threshold.max(1) || since_last_flush >= self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending_never_flushes() {
        let policy = FlushPolicy::default();
        assert!(!policy.should_flush(0, Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn test_mutation_threshold() {
        let policy = FlushPolicy::default();
        assert!(!policy.should_flush(1, Duration::from_secs(5)));
        assert!(policy.should_flush(2, Duration::from_secs(5)));
    }

    #[test]
    fn test_elapsed_interval() {
        let policy = FlushPolicy {
            interval: Duration::from_secs(60),
            mutation_threshold: 100,
        };
        assert!(!policy.should_flush(1, Duration::from_secs(59)));
        assert!(policy.should_flush(1, Duration::from_secs(60)));
    }
}
