//! Fix outcomes and the per-fix report entry.

use serde::{Deserialize, Serialize};

use super::category::BugCategory;
use super::failure::FailureRecord;

/// Tag prefixed to generated commit messages and review markers.
pub const AGENT_TAG: &str = "[AI-AGENT]";

/// Outcome of one strategy invocation. Never partial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "PascalCase")]
pub enum FixResult {
    /// The file was rewritten.
    Fixed { action: String },
    /// The file was left untouched.
    Failed { reason: String },
}

impl FixResult {
    pub fn fixed(action: impl Into<String>) -> Self {
        FixResult::Fixed {
            action: action.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        FixResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, FixResult::Fixed { .. })
    }

    pub fn status(&self) -> FixStatus {
        match self {
            FixResult::Fixed { .. } => FixStatus::Fixed,
            FixResult::Failed { .. } => FixStatus::Failed,
        }
    }

    /// Action text for a fix, reason text for a failure.
    pub fn detail(&self) -> &str {
        match self {
            FixResult::Fixed { action } => action,
            FixResult::Failed { reason } => reason,
        }
    }
}

/// Flattened status used in reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FixStatus {
    Fixed,
    Failed,
}

/// One entry of the run's ordered fix list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixRecord {
    pub file: String,
    pub category: BugCategory,
    pub line: u32,
    pub message: String,
    pub commit_message: String,
    pub status: FixStatus,
    /// Action taken, or the reason nothing was done.
    pub action: String,
}

impl FixRecord {
    /// Build the report entry for one classified failure and its outcome.
    pub fn new(failure: &FailureRecord, category: BugCategory, result: &FixResult) -> Self {
        let verb = if result.is_fixed() {
            "Fix"
        } else {
            "Attempted fix"
        };
        let line = if failure.line > 0 {
            failure.line.to_string()
        } else {
            "N/A".to_string()
        };
        let commit_message = format!(
            "{AGENT_TAG} {verb}: {} in {} line {line}",
            category.label(),
            failure.file_name()
        );

        Self {
            file: failure.file.clone(),
            category,
            line: failure.line,
            message: failure.message.clone(),
            commit_message,
            status: result.status(),
            action: result.detail().to_string(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.status == FixStatus::Fixed
    }
}
