//! Process-wide execution counters
//!
//! These are informational only — they are not part of the memoization
//! correctness surface and are never consulted by the executor's decision
//! logic. Scoped to the process lifecycle with an explicit reset hook for
//! test isolation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters incremented by the engine
///
/// Cheap to share: every field is a plain [`AtomicU64`], so a single
/// `static` instance (see [`metrics()`]) can be read and written from any
/// number of concurrent workflow threads without locking.
#[derive(Debug, Default)]
pub struct Metrics {
    steps: AtomicU64,
    failures: AtomicU64,
    workflow_restarts: AtomicU64,
    compensations: AtomicU64,
}

impl Metrics {
    /// Number of steps that completed successfully
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Number of step failures recorded (including ones that will be retried)
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of times a workflow resumed from a prior run
    pub fn workflow_restarts(&self) -> u64 {
        self.workflow_restarts.load(Ordering::Relaxed)
    }

    /// Number of compensation actions executed
    pub fn compensations(&self) -> u64 {
        self.compensations.load(Ordering::Relaxed)
    }

    pub(crate) fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_workflow_restart(&self) {
        self.workflow_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compensation(&self) {
        self.compensations.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all counters to zero. Only used in tests.
    pub fn reset(&self) {
        self.steps.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.workflow_restarts.store(0, Ordering::Relaxed);
        self.compensations.store(0, Ordering::Relaxed);
    }
}

/// The process-wide metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: Metrics = Metrics {
        steps: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        workflow_restarts: AtomicU64::new(0),
        compensations: AtomicU64::new(0),
    };
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let m = Metrics::default();
        assert_eq!(m.steps(), 0);
        m.record_step();
        m.record_step();
        m.record_failure();
        m.record_workflow_restart();
        m.record_compensation();
        assert_eq!(m.steps(), 2);
        assert_eq!(m.failures(), 1);
        assert_eq!(m.workflow_restarts(), 1);
        assert_eq!(m.compensations(), 1);
    }

    #[test]
    fn reset_clears_all_counters() {
        let m = Metrics::default();
        m.record_step();
        m.record_failure();
        m.reset();
        assert_eq!(m.steps(), 0);
        assert_eq!(m.failures(), 0);
    }
}
