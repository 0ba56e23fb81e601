//! Test runner trait and the outcome it reports.
//!
//! Implementations detect a project's test tooling, execute it and hand the
//! captured output to the parser. The concrete process-backed runner lives
//! in `reparo-ci`; scripted fakes live in [`crate::fakes`].

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{FailureRecord, SourceFamily};

// ---------------------------------------------------------------------------
// Runner trait
// ---------------------------------------------------------------------------

/// Executes a working copy's test suite.
///
/// Never fails: spawn errors and timeouts are reported as a failed outcome
/// carrying one synthetic failure record.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self, workdir: &Path) -> TestRunOutcome;
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one test execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRunOutcome {
    pub passed: bool,

    /// Combined stdout and stderr, truncated.
    pub raw_output: String,

    /// Empty when `passed`, non-empty otherwise.
    pub failures: Vec<FailureRecord>,

    /// Tool that ran (`npm`, `pytest`, `custom`, `none`, ...).
    pub runner: String,

    /// Project family the output was parsed as.
    pub family: SourceFamily,

    pub duration_ms: u64,
}

impl TestRunOutcome {
    /// Outcome for a working copy without any test tooling.
    pub fn no_tests() -> Self {
        Self {
            passed: true,
            raw_output: "No test framework detected".to_string(),
            failures: Vec::new(),
            runner: "none".to_string(),
            family: SourceFamily::Unknown,
            duration_ms: 0,
        }
    }

    pub fn passed(runner: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self {
            passed: true,
            raw_output: raw_output.into(),
            failures: Vec::new(),
            runner: runner.into(),
            family: SourceFamily::Unknown,
            duration_ms: 0,
        }
    }

    pub fn failed(
        runner: impl Into<String>,
        raw_output: impl Into<String>,
        failures: Vec<FailureRecord>,
    ) -> Self {
        Self {
            passed: false,
            raw_output: raw_output.into(),
            failures,
            runner: runner.into(),
            family: SourceFamily::Unknown,
            duration_ms: 0,
        }
    }

    /// A failed outcome for a process that could not run to completion.
    pub fn errored(runner: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        let failure = FailureRecord::generic(error.clone(), error.clone());
        Self::failed(runner, error, vec![failure])
    }

    pub fn with_family(mut self, family: SourceFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tests_is_a_pass() {
        let outcome = TestRunOutcome::no_tests();
        assert!(outcome.passed);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.runner, "none");
    }

    #[test]
    fn test_errored_carries_one_synthetic_failure() {
        let outcome = TestRunOutcome::errored("npm", "timed out after 180s");
        assert!(!outcome.passed);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].file, "unknown");
        assert_eq!(outcome.failures[0].message, "timed out after 180s");
    }
}
