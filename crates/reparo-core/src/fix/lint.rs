use std::path::Path;

use regex::Regex;

use super::source::SourceFile;
use super::{first_quoted, is_import_line, FixStrategy, FILE_NOT_FOUND};
use crate::domain::{BugCategory, FailureRecord, FixResult, Result};

/// Removes an unused import or require line.
#[derive(Debug, Default)]
pub struct LintingStrategy;

fn mentions_unused(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("unused") || msg.contains("never used") || msg.contains("no-unused")
}

/// Find the import line for `name`, matched as a whole identifier or path.
fn find_import_of(lines: &[String], name: &str) -> Option<usize> {
    let pattern = format!(r"(^|[^\w$./-]){}($|[^\w$./-])", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    lines
        .iter()
        .position(|l| is_import_line(l) && re.is_match(l))
}

impl FixStrategy for LintingStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::Linting
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let Some(mut src) = SourceFile::open(workdir, failure)? else {
            return Ok(FixResult::failed(FILE_NOT_FOUND));
        };
        if !mentions_unused(&failure.message) {
            return Ok(FixResult::failed("No applicable linting fix"));
        }

        let index = src
            .target_index(failure)
            .filter(|&i| is_import_line(&src.lines[i]))
            .or_else(|| {
                first_quoted(&failure.message).and_then(|name| find_import_of(&src.lines, name))
            });

        let Some(index) = index else {
            return Ok(FixResult::failed("No applicable linting fix"));
        };

        let removed = src.lines.remove(index);
        src.save()?;
        Ok(FixResult::fixed(format!(
            "Removed unused import: {}",
            removed.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(name: &str, contents: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(name), contents).unwrap();
        dir
    }

    #[test]
    fn test_removes_import_at_reported_line() {
        let dir = setup("app.py", "import os\nimport sys\n\nprint(sys.argv)\n");
        let failure = FailureRecord::new("app.py", 1, "F401 'os' imported but unused", "");

        let result = LintingStrategy.apply(dir.path(), &failure).unwrap();
        assert_eq!(result, FixResult::fixed("Removed unused import: import os"));
        assert_eq!(
            fs::read_to_string(dir.path().join("app.py")).unwrap(),
            "import sys\n\nprint(sys.argv)\n"
        );
    }

    #[test]
    fn test_recovers_line_by_search() {
        let dir = setup(
            "index.js",
            "const path = require('path');\nconst fs = require('fs');\nmodule.exports = path;\n",
        );
        let failure = FailureRecord::new(
            "index.js",
            0,
            "'fs' is assigned a value but never used  no-unused-vars",
            "",
        );

        let result = LintingStrategy.apply(dir.path(), &failure).unwrap();
        assert!(result.is_fixed());
        assert_eq!(
            fs::read_to_string(dir.path().join("index.js")).unwrap(),
            "const path = require('path');\nmodule.exports = path;\n"
        );
    }

    #[test]
    fn test_non_import_line_is_not_deleted() {
        let contents = "x = 1\ny = 2\n";
        let dir = setup("m.py", contents);
        let failure = FailureRecord::new("m.py", 2, "unused variable 'y'", "");

        let result = LintingStrategy.apply(dir.path(), &failure).unwrap();
        assert!(!result.is_fixed());
        assert_eq!(fs::read_to_string(dir.path().join("m.py")).unwrap(), contents);
    }

    #[test]
    fn test_other_lint_messages_fail() {
        let dir = setup("m.py", "import os\n");
        let failure = FailureRecord::new("m.py", 1, "line too long (120 > 79)", "");
        let result = LintingStrategy.apply(dir.path(), &failure).unwrap();
        assert_eq!(result, FixResult::failed("No applicable linting fix"));
    }
}
