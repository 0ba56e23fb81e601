//! Reparo Core Library
//!
//! Test-failure remediation: parse failing test output, classify each
//! failure, apply a deterministic fix and retry within a bounded budget.

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod events;
pub mod fakes;
pub mod fix;
pub mod git;
pub mod metrics;
pub mod obs;
pub mod parser;
pub mod runner;
pub mod scm;
pub mod score;
pub mod store;
pub mod telemetry;

pub use classifier::{classify, classify_all};

pub use config::{GitConfig, ParserConfig, ReparoConfig, RunnerConfig, ScoringConfig};

pub use coordinator::RetryCoordinator;

pub use domain::{
    BugCategory, FailureRecord, FixRecord, FixResult, FixStatus, IterationOutcome,
    IterationRecord, ProgressEvent, ProgressKind, ReparoError, Result, RunRequest, RunResult,
    RunState, RunStatus, RunSummary, ScoreBreakdown, SourceFamily,
};

pub use events::{ChannelSink, EventSink, TracingSink};

pub use fix::{FixEngine, FixStrategy};

pub use git::{capture_head_sha, is_git_repo, GitSourceControl};

pub use metrics::METRICS;

pub use obs::{
    emit_fix_outcome, emit_iteration_finished, emit_push_warning, emit_run_finished,
    emit_run_started, run_span, RunSpan,
};

pub use parser::parse_output;

pub use runner::{TestRunOutcome, TestRunner};

pub use scm::{CommitOutcome, LocalCheckout, SourceControl};

pub use score::compute_score;

pub use store::{FsResultStore, ResultStore};

pub use telemetry::init_tracing;

/// Reparo version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
