//! The bounded retry loop.
//!
//! [`RetryCoordinator`] runs the state machine
//! `Running(1) → … → Running(n) → Passed | Exhausted`:
//!
//! 1. run the tests and record one timeline entry
//! 2. stop with `Passed` if they pass
//! 3. classify and fix every failure, recording each outcome
//! 4. hand successful fixes to source control (best effort)
//! 5. advance, stopping with `Exhausted` once the budget is spent
//!
//! Only acquisition of the working copy can fail a run. Everything after
//! that degrades to `Failed` fix entries or warnings on the result record.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::ReparoConfig;
use crate::domain::{
    FixRecord, ProgressEvent, ProgressKind, ReparoError, Result, RunRequest, RunResult, RunState,
    RunStatus, AGENT_TAG,
};
use crate::events::EventSink;
use crate::fix::FixEngine;
use crate::metrics::METRICS;
use crate::obs;
use crate::parser::synthesize_generic;
use crate::runner::TestRunner;
use crate::scm::SourceControl;
use crate::score::compute_score;

/// Identity and clock of one run.
struct RunClock {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Drives test → classify → fix → commit cycles against one working copy.
pub struct RetryCoordinator {
    runner: Arc<dyn TestRunner>,
    scm: Arc<dyn SourceControl>,
    sink: Arc<dyn EventSink>,
    engine: FixEngine,
    config: ReparoConfig,
}

impl RetryCoordinator {
    pub fn new(
        runner: Arc<dyn TestRunner>,
        scm: Arc<dyn SourceControl>,
        sink: Arc<dyn EventSink>,
        config: ReparoConfig,
    ) -> Self {
        Self {
            runner,
            scm,
            sink,
            engine: FixEngine::new(),
            config,
        }
    }

    pub fn config(&self) -> &ReparoConfig {
        &self.config
    }

    fn emit(&self, kind: ProgressKind, message: impl Into<String>, payload: serde_json::Value) {
        self.sink.emit(ProgressEvent::new(kind, message, payload));
    }

    fn notice(&self, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::notice(message));
    }

    fn start(&self, request: &RunRequest) -> RunClock {
        let clock = RunClock {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
        };
        let branch = request.branch_name();
        obs::emit_run_started(
            &clock.run_id.to_string(),
            &request.repo_url,
            &branch,
            self.config.retry_limit,
        );
        self.emit(
            ProgressKind::RunStarted,
            "Starting remediation run",
            json!({
                "run_id": clock.run_id,
                "repo_url": request.repo_url,
                "branch_name": branch,
                "retry_limit": self.config.retry_limit,
            }),
        );
        clock
    }

    /// Acquire and branch a working copy, then drive the loop to completion.
    ///
    /// Returns `Err` only when the working copy cannot be acquired or
    /// branched.
    pub async fn run(&self, request: &RunRequest) -> Result<RunResult> {
        let clock = self.start(request);
        let span = obs::run_span(&clock.run_id.to_string());
        self.acquire_and_drive(clock, request).instrument(span).await
    }

    async fn acquire_and_drive(&self, clock: RunClock, request: &RunRequest) -> Result<RunResult> {
        let branch = request.branch_name();

        self.notice(format!("Acquiring working copy: {}", request.repo_url));
        let workdir = match self.scm.acquire(&request.repo_url).await {
            Ok(path) => path,
            Err(e) => return Err(self.abort(e)),
        };
        self.notice(format!("Working copy ready: {}", workdir.display()));

        self.notice(format!("Creating branch: {branch}"));
        if let Err(e) = self.scm.create_branch(&workdir, &branch).await {
            return Err(self.abort(e));
        }

        Ok(self.iterate(clock, request, &workdir).await)
    }

    /// Drive the loop against an existing working copy. Never fails.
    pub async fn drive(&self, request: &RunRequest, workdir: &Path) -> RunResult {
        let clock = self.start(request);
        let span = obs::run_span(&clock.run_id.to_string());
        self.iterate(clock, request, workdir).instrument(span).await
    }

    fn abort(&self, error: ReparoError) -> ReparoError {
        let error = match error {
            e @ ReparoError::Acquisition(_) => e,
            other => ReparoError::Acquisition(other.to_string()),
        };
        warn!(error = %error, "run aborted before the first iteration");
        self.notice(format!("Run aborted: {error}"));
        error
    }

    async fn iterate(&self, clock: RunClock, request: &RunRequest, workdir: &Path) -> RunResult {
        let run_id = clock.run_id.to_string();
        let branch = request.branch_name();
        let limit = self.config.retry_limit;
        let mut state = RunState::new(limit);
        let mut warnings = Vec::new();

        let status = loop {
            if !state.has_budget() {
                warn!(retry_limit = limit, "no retry budget, tests not run");
                break RunStatus::Exhausted;
            }
            let iteration = state.iteration();
            self.emit(
                ProgressKind::IterationStarted,
                format!("Running tests - Iteration {iteration}/{limit}"),
                json!({ "iteration": iteration, "max_iterations": limit }),
            );

            let mut outcome = self.runner.run_tests(workdir).await;
            METRICS.inc_iterations();
            if !outcome.passed && outcome.failures.is_empty() {
                outcome.failures.push(synthesize_generic(&outcome.raw_output));
            }

            let timestamp = Utc::now();
            state.record_iteration(outcome.passed, timestamp);
            obs::emit_iteration_finished(&run_id, iteration, outcome.passed, outcome.failures.len());
            self.emit(
                ProgressKind::TestResult,
                if outcome.passed {
                    "All tests passed".to_string()
                } else {
                    format!("Tests failed: {} failure(s)", outcome.failures.len())
                },
                json!({
                    "iteration": iteration,
                    "passed": outcome.passed,
                    "runner": outcome.runner,
                    "duration_ms": outcome.duration_ms,
                    "failures": outcome.failures,
                    "timestamp": timestamp,
                }),
            );

            if outcome.passed {
                break RunStatus::Passed;
            }

            state.record_failures(outcome.failures.len());
            let mut fixed = 0usize;
            for failure in &outcome.failures {
                let category = classify(failure);
                let result = self.engine.apply(workdir, failure, category);
                METRICS.record_fix(result.is_fixed());
                obs::emit_fix_outcome(&run_id, &failure.file, category, &result);

                let record = FixRecord::new(failure, category, &result);
                self.emit(
                    ProgressKind::FixOutcome,
                    format!(
                        "{}: {} - {}",
                        if result.is_fixed() { "Fixed" } else { "Not fixed" },
                        failure.file,
                        category
                    ),
                    json!({ "iteration": iteration, "fix": record }),
                );
                if record.is_fixed() {
                    fixed += 1;
                }
                state.record_fix(record);
            }

            if fixed > 0 {
                if let Some(warning) = self.commit(&run_id, workdir, &branch, iteration, fixed).await {
                    warnings.push(warning);
                }
            }

            if !state.advance() {
                break RunStatus::Exhausted;
            }
        };

        self.finish(clock, request, &branch, status, state, warnings)
    }

    /// Hand this iteration's fixes to source control. Returns a warning on failure.
    async fn commit(
        &self,
        run_id: &str,
        workdir: &Path,
        branch: &str,
        iteration: u32,
        fixed: usize,
    ) -> Option<String> {
        let message = format!("{AGENT_TAG} Fix iteration {iteration}: {fixed} issue(s) resolved");
        self.notice(format!("Committing: {message}"));

        let warning = match self.scm.commit_and_push(workdir, branch, &message).await {
            Ok(outcome) => {
                info!(branch, ?outcome, "commit finished");
                outcome.warning(branch)
            }
            Err(e) => Some(format!("commit on {branch} failed: {e}")),
        };

        match &warning {
            Some(w) => {
                obs::emit_push_warning(run_id, branch, w);
                self.notice(w.clone());
            }
            None => self.notice(format!("Pushed to branch: {branch}")),
        }
        warning
    }

    fn finish(
        &self,
        clock: RunClock,
        request: &RunRequest,
        branch: &str,
        status: RunStatus,
        state: RunState,
        warnings: Vec<String>,
    ) -> RunResult {
        let elapsed_secs = clock.started.elapsed().as_secs();
        let total_failures = state.total_failures_seen();
        let total_fixes = state.total_fixes_applied();
        let iterations = state.iterations_used();
        let score_breakdown = compute_score(elapsed_secs, total_fixes, &self.config.scoring);
        let (timeline, fixes) = state.finalize();

        let result = RunResult {
            run_id: clock.run_id,
            branch_name: branch.to_string(),
            repo_url: request.repo_url.clone(),
            status,
            total_failures,
            total_fixes,
            iterations,
            max_iterations: self.config.retry_limit,
            elapsed_secs,
            score: score_breakdown.total(),
            score_breakdown,
            timeline,
            fixes,
            warnings,
            started_at: clock.started_at,
            finished_at: Utc::now(),
        };

        METRICS.inc_runs_finished();
        METRICS.flush();
        obs::emit_run_finished(
            &result.run_id.to_string(),
            status,
            iterations,
            total_fixes,
            elapsed_secs,
        );
        self.emit(
            ProgressKind::RunFinished,
            match status {
                RunStatus::Passed => format!("All tests passed after {iterations} iteration(s)"),
                RunStatus::Exhausted => format!("Retry budget exhausted after {iterations} iteration(s)"),
            },
            json!({
                "run_id": result.run_id,
                "status": status,
                "iterations": iterations,
                "total_failures": total_failures,
                "total_fixes": total_fixes,
                "score": result.score,
            }),
        );
        result
    }
}
