//! Structured lifecycle logging for remediation runs.
//!
//! Each function emits one `tracing` event with a stable `event` field so
//! logs can be filtered by lifecycle step. Pair with [`RunSpan`] to tag
//! everything inside a run with its id.

use tracing::{info, warn};

use crate::domain::{BugCategory, FixResult, RunStatus};

/// The `reparo.run` span for `run_id`, for instrumenting futures.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("reparo.run", run_id = %run_id)
}

/// RAII guard that enters a run-scoped tracing span on synchronous code.
///
/// Do not hold across `.await`; instrument the future with [`run_span`].
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, repo: &str, branch: &str, retry_limit: u32) {
    info!(
        event = "run.started",
        run_id = %run_id,
        repo = %repo,
        branch = %branch,
        retry_limit = retry_limit,
    );
}

pub fn emit_iteration_finished(run_id: &str, iteration: u32, passed: bool, failures: usize) {
    info!(
        event = "run.iteration_finished",
        run_id = %run_id,
        iteration = iteration,
        passed = passed,
        failures = failures,
    );
}

pub fn emit_fix_outcome(run_id: &str, file: &str, category: BugCategory, result: &FixResult) {
    info!(
        event = "run.fix_outcome",
        run_id = %run_id,
        file = %file,
        category = %category,
        fixed = result.is_fixed(),
        detail = %result.detail(),
    );
}

/// Push retries exhausted; the fix stays in the local commit.
pub fn emit_push_warning(run_id: &str, branch: &str, warning: &str) {
    warn!(event = "run.push_warning", run_id = %run_id, branch = %branch, warning = %warning);
}

pub fn emit_run_finished(
    run_id: &str,
    status: RunStatus,
    iterations: u32,
    fixes_applied: u32,
    elapsed_secs: u64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = ?status,
        iterations = iterations,
        fixes_applied = fixes_applied,
        elapsed_secs = elapsed_secs,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _span = RunSpan::enter("test-run-id");
    }
}
