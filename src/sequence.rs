//! Monotonic per-context step sequencing

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces the stable integer suffix of a step key
///
/// Exactly one [`SequenceManager::next`] call happens per
/// [`crate::engine::StepExecutor::run`] invocation, before any store access.
/// Given the same workflow code path executed in the same order, the *i*-th
/// call returns `i` (1-based) on every run — this is what makes `step_key`
/// stable across restarts. The counter itself does not need to survive a
/// restart; only the *position* in a deterministic call sequence does.
#[derive(Debug, Default)]
pub struct SequenceManager {
    current: AtomicU64,
}

impl SequenceManager {
    /// Create a fresh sequence manager starting at 0
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Atomically increment and return the new value
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Peek at the current value without incrementing
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Reset the counter to zero. Only used in tests.
    pub fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn next_starts_at_one_and_increments() {
        let seq = SequenceManager::new();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.next(), 3);
        assert_eq!(seq.current(), 3);
    }

    #[test]
    fn reset_returns_to_zero() {
        let seq = SequenceManager::new();
        seq.next();
        seq.next();
        seq.reset();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn concurrent_next_calls_yield_distinct_values() {
        let seq = Arc::new(SequenceManager::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let seq = seq.clone();
            handles.push(std::thread::spawn(move || seq.next()));
        }
        let mut values: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, (1..=8).collect::<Vec<_>>());
    }
}
