//! Progress events streamed to observers while a run executes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressKind {
    RunStarted,
    IterationStarted,
    TestResult,
    FixOutcome,
    /// Informational step that is not a state transition.
    Notice,
    RunFinished,
}

/// A single progress event. Events are emitted in strict chronological order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub message: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            message: message.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(ProgressKind::Notice, message, serde_json::Value::Null)
    }

    /// Whether this event marks a state transition (anything but a notice).
    pub fn is_transition(&self) -> bool {
        self.kind != ProgressKind::Notice
    }
}
