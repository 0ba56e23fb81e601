//! Process-wide counters for remediation runs.
//!
//! Counters are bumped at the call site and emitted together by
//! [`Metrics::flush`] at the end of each run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free atomic counters.
pub struct Metrics {
    iterations_executed: AtomicU64,
    fixes_applied: AtomicU64,
    fixes_failed: AtomicU64,
    runs_finished: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            iterations_executed: AtomicU64::new(0),
            fixes_applied: AtomicU64::new(0),
            fixes_failed: AtomicU64::new(0),
            runs_finished: AtomicU64::new(0),
        }
    }

    pub fn inc_iterations(&self) {
        self.iterations_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations_executed", "counter incremented");
    }

    /// Count one strategy outcome.
    pub fn record_fix(&self, fixed: bool) {
        if fixed {
            self.fixes_applied.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = "fixes_applied", "counter incremented");
        } else {
            self.fixes_failed.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = "fixes_failed", "counter incremented");
        }
    }

    pub fn inc_runs_finished(&self) {
        self.runs_finished.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_finished", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            iterations_executed = self.iterations_executed(),
            fixes_applied = self.fixes_applied(),
            fixes_failed = self.fixes_failed(),
            runs_finished = self.runs_finished(),
        );
    }

    pub fn iterations_executed(&self) -> u64 {
        self.iterations_executed.load(Ordering::Relaxed)
    }

    pub fn fixes_applied(&self) -> u64 {
        self.fixes_applied.load(Ordering::Relaxed)
    }

    pub fn fixes_failed(&self) -> u64 {
        self.fixes_failed.load(Ordering::Relaxed)
    }

    pub fn runs_finished(&self) -> u64 {
        self.runs_finished.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.iterations_executed.store(0, Ordering::Relaxed);
        self.fixes_applied.store(0, Ordering::Relaxed);
        self.fixes_failed.store(0, Ordering::Relaxed);
        self.runs_finished.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_iterations();
        m.inc_iterations();
        m.record_fix(true);
        m.record_fix(false);
        m.record_fix(false);
        m.inc_runs_finished();

        assert_eq!(m.iterations_executed(), 2);
        assert_eq!(m.fixes_applied(), 1);
        assert_eq!(m.fixes_failed(), 2);
        assert_eq!(m.runs_finished(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_iterations();
        m.record_fix(true);
        m.inc_runs_finished();
        m.reset();
        assert_eq!(m.iterations_executed(), 0);
        assert_eq!(m.fixes_applied(), 0);
        assert_eq!(m.runs_finished(), 0);
    }
}
