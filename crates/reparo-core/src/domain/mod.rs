//! Domain models for Reparo.
//!
//! Canonical definitions for the core entities:
//! - `FailureRecord`: one observation extracted from failing test output
//! - `BugCategory`: the closed classification of a failure
//! - `FixResult` / `FixRecord`: outcome of a fix strategy and its report entry
//! - `RunState` / `RunResult`: retry loop state and the final result record
//! - `ProgressEvent`: events streamed to observers

pub mod category;
pub mod error;
pub mod event;
pub mod failure;
pub mod fix;
pub mod run;

pub use category::BugCategory;
pub use error::{ReparoError, Result};
pub use event::{ProgressEvent, ProgressKind};
pub use failure::{FailureRecord, SourceFamily, UNKNOWN_FILE};
pub use fix::{FixRecord, FixResult, FixStatus, AGENT_TAG};
pub use run::{
    IterationOutcome, IterationRecord, RunRequest, RunResult, RunState, RunStatus, RunSummary,
    ScoreBreakdown,
};
