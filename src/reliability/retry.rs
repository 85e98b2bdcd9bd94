//! Retry policy for step execution

use serde::{Deserialize, Serialize};

/// Declarative retry limits and backoff schedule for a step
///
/// Pure exponential backoff with no jitter: `backoff_for_attempt(attempt) =
/// initial_backoff_ms * 2^(attempt - 1)`. Unlike a full scheduler, this
/// policy only governs whether and when the *executor* considers a failed
/// step eligible for another attempt — it never sleeps on the caller's
/// behalf (see the design notes on `next_retry_at`).
///
/// # Example
///
/// ```
/// use durable_steps::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, 1_000);
/// assert_eq!(policy.backoff_for_attempt(1), 1_000);
/// assert_eq!(policy.backoff_for_attempt(2), 2_000);
/// assert_eq!(policy.backoff_for_attempt(3), 4_000);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Initial backoff in milliseconds, doubled on each subsequent attempt
    pub initial_backoff_ms: u64,
}

impl RetryPolicy {
    /// 3 attempts, 1 second initial backoff
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 1_000,
    };

    /// 5 attempts, 500 ms initial backoff
    pub const AGGRESSIVE: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        initial_backoff_ms: 500,
    };

    /// A single attempt, no retry
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        initial_backoff_ms: 0,
    };

    /// Build a custom policy
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero; a policy must allow at least the
    /// initial attempt.
    pub fn new(max_attempts: u32, initial_backoff_ms: u64) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            max_attempts,
            initial_backoff_ms,
        }
    }

    /// Backoff in milliseconds before the given 1-based attempt number
    ///
    /// `attempt` is the attempt about to be made (1 = the first retry after
    /// an initial failure). Saturates rather than overflowing for large
    /// attempt numbers.
    pub fn backoff_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(62);
        self.initial_backoff_ms.saturating_mul(1u64 << exponent)
    }

    /// Whether another attempt is allowed given attempts already made
    pub fn has_attempts_remaining(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset() {
        assert_eq!(RetryPolicy::DEFAULT.max_attempts, 3);
        assert_eq!(RetryPolicy::DEFAULT.initial_backoff_ms, 1_000);
    }

    #[test]
    fn aggressive_preset() {
        assert_eq!(RetryPolicy::AGGRESSIVE.max_attempts, 5);
        assert_eq!(RetryPolicy::AGGRESSIVE.initial_backoff_ms, 500);
    }

    #[test]
    fn none_preset_allows_single_attempt() {
        assert_eq!(RetryPolicy::NONE.max_attempts, 1);
        assert!(!RetryPolicy::NONE.has_attempts_remaining(1));
    }

    #[test]
    fn exponential_backoff_no_jitter() {
        let policy = RetryPolicy::new(10, 1_000);
        assert_eq!(policy.backoff_for_attempt(1), 1_000);
        assert_eq!(policy.backoff_for_attempt(2), 2_000);
        assert_eq!(policy.backoff_for_attempt(3), 4_000);
        assert_eq!(policy.backoff_for_attempt(4), 8_000);
    }

    #[test]
    fn backoff_does_not_overflow_at_high_attempts() {
        let policy = RetryPolicy::new(100, 1);
        let delay = policy.backoff_for_attempt(100);
        assert!(delay > 0);
    }

    #[test]
    fn has_attempts_remaining() {
        let policy = RetryPolicy::new(3, 10);
        assert!(policy.has_attempts_remaining(0));
        assert!(policy.has_attempts_remaining(2));
        assert!(!policy.has_attempts_remaining(3));
    }

    #[test]
    #[should_panic(expected = "max_attempts must be at least 1")]
    fn zero_max_attempts_panics() {
        RetryPolicy::new(0, 100);
    }

    #[test]
    fn serialization_round_trips() {
        let policy = RetryPolicy::new(7, 250);
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, parsed);
    }
}
