//! Deterministic fix strategies, one per [`BugCategory`].
//!
//! [`FixEngine::apply`] dispatches through an exhaustive `match`, so adding a
//! category without a strategy does not compile. Strategies return
//! `Result<FixResult>`; any `Err` is converted into a `Failed` result so one
//! bad fix never aborts the retry loop.

mod annotate;
mod import;
mod indent;
mod lint;
pub mod source;
mod syntax;

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::{BugCategory, FailureRecord, FixResult, Result};

pub use annotate::{LogicStrategy, TypeErrorStrategy};
pub use import::ImportStrategy;
pub use indent::IndentationStrategy;
pub use lint::LintingStrategy;
pub use source::SourceFile;
pub use syntax::SyntaxStrategy;

/// Reason returned when the implicated file cannot be resolved.
pub const FILE_NOT_FOUND: &str = "File not found";

/// Reason returned when a line-oriented strategy has no usable target line.
pub const INVALID_LINE: &str = "Invalid line number";

/// A category-specific text transformation.
pub trait FixStrategy: Send + Sync {
    fn category(&self) -> BugCategory;

    /// Apply the fix inside `workdir`. The target file is either left
    /// untouched or rewritten whole.
    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult>;
}

/// Holds one strategy per category.
#[derive(Debug, Default)]
pub struct FixEngine {
    linting: LintingStrategy,
    syntax: SyntaxStrategy,
    logic: LogicStrategy,
    type_error: TypeErrorStrategy,
    import: ImportStrategy,
    indentation: IndentationStrategy,
}

impl FixEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The strategy handling `category`.
    pub fn strategy(&self, category: BugCategory) -> &dyn FixStrategy {
        match category {
            BugCategory::Linting => &self.linting,
            BugCategory::Syntax => &self.syntax,
            BugCategory::Logic => &self.logic,
            BugCategory::TypeError => &self.type_error,
            BugCategory::Import => &self.import,
            BugCategory::Indentation => &self.indentation,
        }
    }

    /// Apply the strategy for `category`, converting errors into `Failed`.
    pub fn apply(&self, workdir: &Path, failure: &FailureRecord, category: BugCategory) -> FixResult {
        let result = match self.strategy(category).apply(workdir, failure) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    file = %failure.file,
                    category = %category,
                    error = %e,
                    "fix strategy errored"
                );
                FixResult::failed(e.to_string())
            }
        };
        debug!(
            file = %failure.file,
            line = failure.line,
            category = %category,
            status = ?result.status(),
            detail = result.detail(),
            "fix strategy finished"
        );
        result
    }
}

/// First single-, double- or back-quoted token in `message`.
pub(crate) fn first_quoted(message: &str) -> Option<&str> {
    let start = message.find(['\'', '"', '`'])?;
    let quote = message[start..].chars().next()?;
    let rest = &message[start + 1..];
    let end = rest.find(quote)?;
    let token = &rest[..end];
    (!token.is_empty()).then_some(token)
}

/// Whether a line is an import or require statement.
pub(crate) fn is_import_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("import ")
        || trimmed.starts_with("from ")
        || trimmed.contains("require(")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_every_category_has_its_strategy() {
        let engine = FixEngine::new();
        for category in BugCategory::ALL {
            assert_eq!(engine.strategy(category).category(), category);
        }
    }

    #[test]
    fn test_strategy_error_becomes_failed() {
        let dir = tempfile::tempdir().unwrap();
        // Invalid UTF-8 makes the read itself fail.
        fs::write(dir.path().join("bin.py"), [0xff, 0xfe, 0x00]).unwrap();

        let failure = FailureRecord::new("bin.py", 1, "invalid syntax", "");
        let result = FixEngine::new().apply(dir.path(), &failure, BugCategory::Syntax);
        assert!(!result.is_fixed());
        assert!(!result.detail().is_empty());
    }

    #[test]
    fn test_missing_file_fails_for_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let failure = FailureRecord::new("nope.py", 1, "anything 'x'", "");
        let engine = FixEngine::new();
        for category in BugCategory::ALL {
            let result = engine.apply(dir.path(), &failure, category);
            assert_eq!(result, FixResult::failed(FILE_NOT_FOUND), "{category}");
        }
    }

    #[test]
    fn test_first_quoted() {
        assert_eq!(first_quoted("No module named 'requests'"), Some("requests"));
        assert_eq!(
            first_quoted("Cannot find module \"lodash/fp\" from 'x'"),
            Some("lodash/fp")
        );
        assert_eq!(first_quoted("no quotes"), None);
        assert_eq!(first_quoted("empty ''"), None);
    }

    #[test]
    fn test_is_import_line() {
        assert!(is_import_line("import os"));
        assert!(is_import_line("  from x import y"));
        assert!(is_import_line("const fs = require('fs');"));
        assert!(!is_import_line("x = 1"));
    }
}
