//! Review-marker strategies for logic and type failures.
//!
//! These do not change behaviour. They tag the failing line with an
//! `[AI-AGENT]` comment so a human can find it, and refuse to tag a line
//! twice.

use std::path::Path;

use super::source::SourceFile;
use super::{FixStrategy, FILE_NOT_FOUND, INVALID_LINE};
use crate::domain::{BugCategory, FailureRecord, FixResult, Result, AGENT_TAG};

const ASSERTION_NOTE: &str = "Logic check - review assertion";
const REFERENCE_NOTE: &str = "TypeError: verify function/variable definition";
const NULL_NOTE: &str = "TypeError: add null check";

/// Append `note` as a marker comment on the failure's line.
fn mark_line(workdir: &Path, failure: &FailureRecord, note: &str, action: &str) -> Result<FixResult> {
    let Some(mut src) = SourceFile::open(workdir, failure)? else {
        return Ok(FixResult::failed(FILE_NOT_FOUND));
    };
    let Some(index) = src.target_index(failure) else {
        return Ok(FixResult::failed(INVALID_LINE));
    };
    let Some(marker) = src.family().comment_marker() else {
        return Ok(FixResult::failed("Unsupported file type for review marker"));
    };

    let line = &src.lines[index];
    if line.trim().is_empty() {
        return Ok(FixResult::failed("Target line is blank"));
    }
    if line.contains(AGENT_TAG) {
        return Ok(FixResult::failed("Line already marked for review"));
    }

    let marked = format!("{line}  {marker} {AGENT_TAG} {note}");
    src.lines[index] = marked;
    src.save()?;
    Ok(FixResult::fixed(action))
}

/// Marks failing assertions for review.
#[derive(Debug, Default)]
pub struct LogicStrategy;

impl FixStrategy for LogicStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::Logic
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let msg = failure.message.to_lowercase();
        let is_assertion = ["assert", "expect(", "expected", "received"]
            .iter()
            .any(|k| msg.contains(k));
        if !is_assertion {
            if SourceFile::open(workdir, failure)?.is_none() {
                return Ok(FixResult::failed(FILE_NOT_FOUND));
            }
            return Ok(FixResult::failed("Logic errors require manual fix"));
        }
        mark_line(workdir, failure, ASSERTION_NOTE, "Marked assertion for review")
    }
}

/// Marks call/reference and null/attribute failures for review.
#[derive(Debug, Default)]
pub struct TypeErrorStrategy;

impl FixStrategy for TypeErrorStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::TypeError
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let msg = failure.message.to_lowercase();
        if msg.contains("is not a function") || msg.contains("is not defined") {
            return mark_line(workdir, failure, REFERENCE_NOTE, "Annotated TypeError for review");
        }
        if ["nonetype", "attributeerror", "cannot read propert", "of null", "of undefined"]
            .iter()
            .any(|k| msg.contains(k))
        {
            return mark_line(workdir, failure, NULL_NOTE, "Annotated TypeError for null check");
        }
        if SourceFile::open(workdir, failure)?.is_none() {
            return Ok(FixResult::failed(FILE_NOT_FOUND));
        }
        Ok(FixResult::failed("No applicable TypeError fix"))
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
    fn test_logic_marks_with_family_comment() {
        let dir = setup("test_math.py", "def test_add():\n    assert add(1, 2) == 4\n");
        let failure = FailureRecord::new("test_math.py", 2, "E   assert 3 == 4", "");

        let result = LogicStrategy.apply(dir.path(), &failure).unwrap();
        assert!(result.is_fixed());
        assert_eq!(
            fs::read_to_string(dir.path().join("test_math.py")).unwrap(),
            "def test_add():\n    assert add(1, 2) == 4  # [AI-AGENT] Logic check - review assertion\n"
        );
    }

    #[test]
    fn test_logic_second_call_is_failed_and_unchanged() {
        let dir = setup("sum.test.js", "expect(sum(1, 2)).toBe(4);\n");
        let failure = FailureRecord::new("sum.test.js", 1, "expect(received).toBe(expected)", "");

        assert!(LogicStrategy.apply(dir.path(), &failure).unwrap().is_fixed());
        let after_first = fs::read_to_string(dir.path().join("sum.test.js")).unwrap();
        assert!(after_first.contains("// [AI-AGENT]"));

        let second = LogicStrategy.apply(dir.path(), &failure).unwrap();
        assert!(!second.is_fixed());
        assert_eq!(
            fs::read_to_string(dir.path().join("sum.test.js")).unwrap(),
            after_first
        );
    }

    #[test]
    fn test_logic_non_assertion_fails() {
        let dir = setup("a.py", "x = 1\n");
        let failure = FailureRecord::new("a.py", 1, "Test suite failed", "");
        assert_eq!(
            LogicStrategy.apply(dir.path(), &failure).unwrap(),
            FixResult::failed("Logic errors require manual fix")
        );
    }

    #[test]
    fn test_type_error_wordings() {
        let dir = setup("a.js", "add(1, 2);\nuser.name;\n");

        let call = FailureRecord::new("a.js", 1, "TypeError: add is not a function", "");
        assert!(TypeErrorStrategy.apply(dir.path(), &call).unwrap().is_fixed());

        let null = FailureRecord::new(
            "a.js",
            2,
            "TypeError: Cannot read properties of undefined (reading 'name')",
            "",
        );
        assert!(TypeErrorStrategy.apply(dir.path(), &null).unwrap().is_fixed());

        let text = fs::read_to_string(dir.path().join("a.js")).unwrap();
        assert!(text.contains("add(1, 2);  // [AI-AGENT] TypeError: verify function/variable definition"));
        assert!(text.contains("user.name;  // [AI-AGENT] TypeError: add null check"));
    }

    #[test]
    fn test_type_error_idempotent() {
        let dir = setup("svc.py", "result = helper()\n");
        let failure = FailureRecord::new("svc.py", 1, "NameError: name 'helper' is not defined", "");

        assert!(TypeErrorStrategy.apply(dir.path(), &failure).unwrap().is_fixed());
        let once = fs::read_to_string(dir.path().join("svc.py")).unwrap();
        assert_eq!(
            TypeErrorStrategy.apply(dir.path(), &failure).unwrap(),
            FixResult::failed("Line already marked for review")
        );
        assert_eq!(fs::read_to_string(dir.path().join("svc.py")).unwrap(), once);
    }

    #[test]
    fn test_unknown_family_cannot_be_marked() {
        let dir = setup("notes.txt", "hello\n");
        let failure = FailureRecord::new("notes.txt", 1, "assert failed", "");
        assert!(!LogicStrategy.apply(dir.path(), &failure).unwrap().is_fixed());
    }
}
