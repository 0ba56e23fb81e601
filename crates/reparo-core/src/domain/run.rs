//! Run state, iteration timeline and the final result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fix::FixRecord;

/// Outcome of one test execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum IterationOutcome {
    Passed,
    Failed,
}

/// Exactly one per loop pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationRecord {
    pub iteration: u32,
    pub outcome: IterationOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Passed,
    Exhausted,
}

/// Mutable loop state owned by the retry coordinator.
///
/// `iteration` starts at 1 and only grows. The timeline gains exactly one
/// record per executed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    iteration: u32,
    retry_limit: u32,
    timeline: Vec<IterationRecord>,
    fix_history: Vec<FixRecord>,
    total_failures_seen: u32,
    total_fixes_applied: u32,
}

impl RunState {
    pub fn new(retry_limit: u32) -> Self {
        Self {
            iteration: 1,
            retry_limit,
            timeline: Vec::new(),
            fix_history: Vec::new(),
            total_failures_seen: 0,
            total_fixes_applied: 0,
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn timeline(&self) -> &[IterationRecord] {
        &self.timeline
    }

    pub fn fix_history(&self) -> &[FixRecord] {
        &self.fix_history
    }

    pub fn total_failures_seen(&self) -> u32 {
        self.total_failures_seen
    }

    pub fn total_fixes_applied(&self) -> u32 {
        self.total_fixes_applied
    }

    /// Append the timeline entry for the current iteration.
    pub fn record_iteration(&mut self, passed: bool, timestamp: DateTime<Utc>) {
        self.timeline.push(IterationRecord {
            iteration: self.iteration,
            outcome: if passed {
                IterationOutcome::Passed
            } else {
                IterationOutcome::Failed
            },
            timestamp,
        });
    }

    pub fn record_failures(&mut self, count: usize) {
        self.total_failures_seen = self.total_failures_seen.saturating_add(count as u32);
    }

    pub fn record_fix(&mut self, record: FixRecord) {
        if record.is_fixed() {
            self.total_fixes_applied += 1;
        }
        self.fix_history.push(record);
    }

    /// Whether the current iteration is within the retry budget.
    pub fn has_budget(&self) -> bool {
        self.iteration <= self.retry_limit
    }

    /// Move to the next iteration. Returns `false` once the budget is spent.
    pub fn advance(&mut self) -> bool {
        self.iteration += 1;
        self.has_budget()
    }

    /// Number of iterations actually executed.
    pub fn iterations_used(&self) -> u32 {
        self.timeline.len() as u32
    }

    /// Consume the state, yielding the timeline and fix list.
    pub fn finalize(self) -> (Vec<IterationRecord>, Vec<FixRecord>) {
        (self.timeline, self.fix_history)
    }
}

/// Presentation-only score. Never feeds back into control flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub base: i64,
    pub time_bonus: i64,
    /// Zero or negative.
    pub commit_penalty: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.base + self.time_bonus + self.commit_penalty
    }
}

/// Input describing one remediation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRequest {
    /// Repository location handed to the source-control collaborator.
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
}

impl RunRequest {
    pub fn new(
        repo_url: impl Into<String>,
        team_name: impl Into<String>,
        leader_name: impl Into<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            team_name: team_name.into(),
            leader_name: leader_name.into(),
        }
    }

    /// Branch that receives the fixes: `TEAM_LEADER_AI_Fix`.
    pub fn branch_name(&self) -> String {
        format!(
            "{}_{}_AI_Fix",
            upper_snake(&self.team_name),
            upper_snake(&self.leader_name)
        )
    }
}

fn upper_snake(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// Final result record of a run, persisted by the results store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub run_id: Uuid,
    pub branch_name: String,
    pub repo_url: String,
    pub status: RunStatus,
    pub total_failures: u32,
    pub total_fixes: u32,
    pub iterations: u32,
    pub max_iterations: u32,
    pub elapsed_secs: u64,
    pub score: i64,
    pub score_breakdown: ScoreBreakdown,
    pub timeline: Vec<IterationRecord>,
    pub fixes: Vec<FixRecord>,
    /// Non-fatal conditions, e.g. a push that never succeeded.
    #[serde(default)]
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Compact listing row for stored results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub branch_name: String,
    pub status: RunStatus,
    pub score: i64,
    pub elapsed_secs: u64,
    pub total_fixes: u32,
    pub finished_at: DateTime<Utc>,
}

impl From<&RunResult> for RunSummary {
    fn from(result: &RunResult) -> Self {
        Self {
            run_id: result.run_id,
            branch_name: result.branch_name.clone(),
            status: result.status,
            score: result.score,
            elapsed_secs: result.elapsed_secs,
            total_fixes: result.total_fixes,
            finished_at: result.finished_at,
        }
    }
}
