//! Test output parser.
//!
//! Converts raw captured test output into [`FailureRecord`]s. Two line
//! grammars exist, one per [`SourceFamily`]:
//!
//! - **brace-delimited** (jest, mocha, vitest, plain node): a rolling
//!   file/line context is updated from `FAIL <file>` headers and
//!   `file:line:col` stack frames; a record is emitted for each line carrying
//!   a syntax, type, module-resolution or assertion signature.
//! - **indent-sensitive** (pytest): the context is updated from
//!   `FAILED file.py::test` summaries, `File "x.py", line N` traceback frames
//!   and `x.py:N:` short tracebacks; a record is emitted for each line naming
//!   one of the recognised exception types.
//!
//! When a failing run yields no structured record, exactly one generic
//! record (`file = "unknown"`, `line = 0`) is synthesized.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::ParserConfig;
use crate::domain::{FailureRecord, SourceFamily, UNKNOWN_FILE};

/// Message used when failing output contains no error-like line at all.
pub const GENERIC_FAILURE_MESSAGE: &str = "Test suite failed";

/// Characters of output kept as context on a synthesized record.
const GENERIC_CONTEXT_CHARS: usize = 500;

const BRACE_CONTEXT_BEFORE: usize = 2;
const BRACE_CONTEXT_AFTER: usize = 5;
const INDENT_CONTEXT_BEFORE: usize = 5;
const INDENT_CONTEXT_AFTER: usize = 3;

// ---------------------------------------------------------------------------
// Brace-delimited grammar
// ---------------------------------------------------------------------------

static JS_FAIL_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"FAIL\s+(\S+\.(?:js|jsx|ts|tsx|mjs|cjs))\b").expect("JS_FAIL_HEADER_RE should compile")
});

/// `path/to/file.js:12:5`, optionally wrapped in a stack frame `(...)`.
static JS_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s()'"]+\.(?:js|jsx|ts|tsx|mjs|cjs)):(\d+):(\d+)"#)
        .expect("JS_FRAME_RE should compile")
});

/// Node's uncaught-error header: a bare `path/to/file.js:12` line.
static JS_NODE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+\.(?:js|jsx|ts|tsx|mjs|cjs)):(\d+)$").expect("JS_NODE_HEADER_RE should compile")
});

/// Babel-style `SyntaxError: /path/file.js: Unexpected token (3:4)`.
static JS_BABEL_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\S+\.(?:js|jsx|ts|tsx|mjs|cjs)): .*\((\d+):(\d+)\)")
        .expect("JS_BABEL_LOCATION_RE should compile")
});

static JS_SYNTAX_SIG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SyntaxError:").expect("JS_SYNTAX_SIG should compile"));

static JS_TYPE_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:TypeError|ReferenceError):").expect("JS_TYPE_SIG should compile")
});

static JS_MODULE_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cannot find module|module not found|ERR_MODULE_NOT_FOUND")
        .expect("JS_MODULE_SIG should compile")
});

/// `AssertionError` anywhere, or jest's matcher hint starting the line.
static JS_ASSERTION_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AssertionError|^\s*expect\(.*\)\.\w+").expect("JS_ASSERTION_SIG should compile")
});

/// Source excerpt lines of a jest/babel code frame: `> 5 |   expect(...)`.
static JS_CODE_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*>?\s*\d+\s*\|").expect("JS_CODE_FRAME_RE should compile")
});

// ---------------------------------------------------------------------------
// Indent-sensitive grammar
// ---------------------------------------------------------------------------

static PY_FAILED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:FAILED|ERROR) (\S+\.py)::(\S+)").expect("PY_FAILED_RE should compile")
});

static PY_TRACEBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File "([^"]+\.py)", line (\d+)"#).expect("PY_TRACEBACK_RE should compile")
});

/// pytest `--tb=short` frame: `tests/test_x.py:12: in test_x`.
static PY_SHORT_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+\.py):(\d+):").expect("PY_SHORT_FRAME_RE should compile")
});

static PY_SYNTAX_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:SyntaxError|IndentationError): ").expect("PY_SYNTAX_SIG should compile")
});

static PY_TYPE_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:TypeError|NameError): ").expect("PY_TYPE_SIG should compile")
});

static PY_IMPORT_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ModuleNotFoundError|ImportError): ").expect("PY_IMPORT_SIG should compile")
});

/// `AssertionError: ...` or pytest's rewritten `E   assert x == y`.
static PY_ASSERTION_SIG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bAssertionError\b|^E\s+assert\s").expect("PY_ASSERTION_SIG should compile")
});

/// Which signature tier a line matched, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signature {
    Syntax,
    Type,
    Module,
    Assertion,
}

/// Match a brace-delimited output line against the signatures, first match wins.
pub fn brace_signature(line: &str) -> Option<Signature> {
    if JS_SYNTAX_SIG.is_match(line) {
        Some(Signature::Syntax)
    } else if JS_TYPE_SIG.is_match(line) {
        Some(Signature::Type)
    } else if JS_MODULE_SIG.is_match(line) {
        Some(Signature::Module)
    } else if JS_ASSERTION_SIG.is_match(line) {
        Some(Signature::Assertion)
    } else {
        None
    }
}

/// Match an indent-sensitive output line against the signatures, first match wins.
pub fn indent_signature(line: &str) -> Option<Signature> {
    if PY_SYNTAX_SIG.is_match(line) {
        Some(Signature::Syntax)
    } else if PY_TYPE_SIG.is_match(line) {
        Some(Signature::Type)
    } else if PY_IMPORT_SIG.is_match(line) {
        Some(Signature::Module)
    } else if PY_ASSERTION_SIG.is_match(line) {
        Some(Signature::Assertion)
    } else {
        None
    }
}

/// Rolling "where are we" state while scanning output.
#[derive(Debug)]
struct Cursor {
    file: String,
    line: u32,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            file: UNKNOWN_FILE.to_string(),
            line: 0,
        }
    }
}

impl Cursor {
    /// Move to `file`. Without a usable line, a line from another file is
    /// dropped rather than carried over.
    fn set(&mut self, file: &str, line: Option<&str>) {
        match line.and_then(|l| l.parse().ok()) {
            Some(n) => self.line = n,
            None if self.file != file => self.line = 0,
            None => {}
        }
        self.file = file.to_string();
    }
}

/// Parse a run's output into failure records.
///
/// Passing runs yield nothing. A failing run always yields at least one
/// record and at most `config.max_failures`.
pub fn parse_output(
    family: SourceFamily,
    output: &str,
    passed: bool,
    config: &ParserConfig,
) -> Vec<FailureRecord> {
    if passed {
        return Vec::new();
    }

    let mut failures = match family {
        SourceFamily::BraceDelimited => parse_brace_output(output),
        SourceFamily::IndentSensitive => parse_indent_output(output),
        SourceFamily::Unknown => Vec::new(),
    };

    if failures.is_empty() {
        failures.push(synthesize_generic(output));
    }

    failures.truncate(config.max_failures.max(1));
    failures
}

/// Structured records from brace-delimited (node) test output.
pub fn parse_brace_output(output: &str) -> Vec<FailureRecord> {
    let lines: Vec<&str> = output.lines().collect();
    let mut cursor = Cursor::default();
    let mut failures = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        // Code frames echo test source, passing lines included.
        if JS_CODE_FRAME_RE.is_match(line) {
            continue;
        }
        if let Some(caps) = JS_FAIL_HEADER_RE.captures(line) {
            cursor.set(&caps[1], None);
        }
        if let Some(caps) = JS_NODE_HEADER_RE.captures(line.trim()) {
            cursor.set(&caps[1], Some(&caps[2]));
        }
        if let Some(caps) = JS_FRAME_RE.captures(line) {
            if !caps[1].contains("node_modules") {
                cursor.set(&caps[1], Some(&caps[2]));
            }
        }

        let Some(signature) = brace_signature(line) else {
            continue;
        };
        if signature == Signature::Syntax {
            if let Some(caps) = JS_BABEL_LOCATION_RE.captures(line) {
                cursor.set(&caps[1], Some(&caps[2]));
            }
        }

        failures.push(FailureRecord::new(
            cursor.file.clone(),
            cursor.line,
            line.trim(),
            context_window(&lines, i, BRACE_CONTEXT_BEFORE, BRACE_CONTEXT_AFTER),
        ));
    }

    failures
}

/// Structured records from indent-sensitive (pytest) test output.
pub fn parse_indent_output(output: &str) -> Vec<FailureRecord> {
    let lines: Vec<&str> = output.lines().collect();
    let mut cursor = Cursor::default();
    let mut failures = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = PY_FAILED_RE.captures(line) {
            cursor.set(&caps[1], None);
        }
        if let Some(caps) = PY_TRACEBACK_RE.captures(line) {
            cursor.set(&caps[1], Some(&caps[2]));
        } else if let Some(caps) = PY_SHORT_FRAME_RE.captures(line) {
            cursor.set(&caps[1], Some(&caps[2]));
        }

        if indent_signature(line).is_some() {
            failures.push(FailureRecord::new(
                cursor.file.clone(),
                cursor.line,
                line.trim(),
                context_window(&lines, i, INDENT_CONTEXT_BEFORE, INDENT_CONTEXT_AFTER),
            ));
        }
    }

    failures
}

/// The single record emitted when nothing structured was recognised.
pub fn synthesize_generic(output: &str) -> FailureRecord {
    let message = output
        .lines()
        .map(str::trim)
        .find(|l| {
            let lower = l.to_ascii_lowercase();
            lower.contains("error") || lower.contains("fail")
        })
        .unwrap_or(GENERIC_FAILURE_MESSAGE)
        .to_string();

    let context: String = output.chars().take(GENERIC_CONTEXT_CHARS).collect();
    FailureRecord::generic(message, context)
}

/// Lines `[i - before, i + after)` joined back together.
fn context_window(lines: &[&str], i: usize, before: usize, after: usize) -> String {
    let start = i.saturating_sub(before);
    let end = (i + after).min(lines.len());
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParserConfig {
        ParserConfig::default()
    }

    #[test]
    fn test_passing_run_yields_nothing() {
        let out = "SyntaxError: whatever";
        assert!(parse_output(SourceFamily::BraceDelimited, out, true, &cfg()).is_empty());
    }

    #[test]
    fn test_jest_type_error_uses_stack_frame() {
        let out = "\
FAIL src/math.test.js
  ● add › sums numbers

    TypeError: add is not a function

      at Object.<anonymous> (src/math.test.js:5:12)
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 1);
        // The frame comes after the message, so the header file is current.
        assert_eq!(failures[0].file, "src/math.test.js");
        assert_eq!(failures[0].message, "TypeError: add is not a function");
    }

    #[test]
    fn test_jest_code_frame_yields_one_record() {
        let out = "\
FAIL src/math.test.js
  ● add › sums

    expect(received).toBe(expected) // Object.is equality

    Expected: 4
    Received: 3

      3 | test('sums', () => {
      4 |   expect(add(1, 1)).toBe(2);
    > 5 |   expect(add(1, 2)).toBe(4);
        |                     ^
      6 |   expect(add(2, 2)).toBe(4);
      7 | });

      at Object.<anonymous> (src/math.test.js:5:21)
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.starts_with("expect(received).toBe"));
        assert_eq!(failures[0].file, "src/math.test.js");
    }

    #[test]
    fn test_code_frame_source_is_not_an_error() {
        let out = "\
TypeError: boom
    > 12 |   throw new TypeError('boom');
         |         ^
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "TypeError: boom");
    }

    #[test]
    fn test_new_fail_header_drops_previous_line() {
        let out = "\
    at Object.<anonymous> (src/a.test.js:40:3)
TypeError: first
FAIL src/b.test.js
TypeError: second
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 2);
        assert_eq!((failures[0].file.as_str(), failures[0].line), ("src/a.test.js", 40));
        assert_eq!((failures[1].file.as_str(), failures[1].line), ("src/b.test.js", 0));
    }

    #[test]
    fn test_same_file_header_keeps_line() {
        let out = "\
    at Object.<anonymous> (src/a.test.js:40:3)
FAIL src/a.test.js
TypeError: first
";
        let failures = parse_brace_output(out);
        assert_eq!(failures[0].line, 40);
    }

    #[test]
    fn test_frame_before_message_sets_line() {
        let out = "\
    at Object.<anonymous> (/repo/src/app.js:14:3)
SyntaxError: Unexpected token '}'
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "/repo/src/app.js");
        assert_eq!(failures[0].line, 14);
    }

    #[test]
    fn test_node_modules_frames_are_ignored() {
        let out = "\
    at run (src/index.js:3:1)
    at Module._compile (node_modules/pirates/lib/index.js:99:24)
TypeError: Cannot read properties of undefined
";
        let failures = parse_brace_output(out);
        assert_eq!(failures[0].file, "src/index.js");
        assert_eq!(failures[0].line, 3);
    }

    #[test]
    fn test_node_header_and_babel_location() {
        let out = "\
/repo/src/app.js:7
  const x = ;
            ^
SyntaxError: Unexpected token ';'
";
        let failures = parse_brace_output(out);
        assert_eq!(failures[0].file, "/repo/src/app.js");
        assert_eq!(failures[0].line, 7);

        let out = "SyntaxError: /repo/src/b.js: Missing semicolon. (12:9)";
        let failures = parse_brace_output(out);
        assert_eq!(failures[0].file, "/repo/src/b.js");
        assert_eq!(failures[0].line, 12);
    }

    #[test]
    fn test_module_and_assertion_signatures() {
        let out = "\
FAIL test/api.test.js
    Cannot find module 'axios' from 'src/api.js'
    expect(received).toBe(expected) // Object.is equality
";
        let failures = parse_brace_output(out);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].message.contains("Cannot find module 'axios'"));
        assert!(failures[1].message.starts_with("expect(received).toBe"));
    }

    #[test]
    fn test_brace_signature_priority() {
        assert_eq!(
            brace_signature("SyntaxError: TypeError: nested"),
            Some(Signature::Syntax)
        );
        assert_eq!(
            brace_signature("TypeError: Cannot find module thing"),
            Some(Signature::Type)
        );
        assert_eq!(
            brace_signature("Error: Cannot find module 'x' AssertionError"),
            Some(Signature::Module)
        );
        assert_eq!(brace_signature("all good"), None);
    }

    #[test]
    fn test_context_window_is_bounded() {
        let mut out = String::new();
        for i in 0..20 {
            out.push_str(&format!("line {i}\n"));
        }
        out.push_str("TypeError: boom\n");
        for i in 21..40 {
            out.push_str(&format!("line {i}\n"));
        }
        let failures = parse_brace_output(&out);
        let ctx: Vec<&str> = failures[0].raw_context.lines().collect();
        assert_eq!(ctx.len(), BRACE_CONTEXT_BEFORE + BRACE_CONTEXT_AFTER);
        assert_eq!(ctx[0], "line 18");
        assert_eq!(ctx[2], "TypeError: boom");
    }

    #[test]
    fn test_python_syntax_error_traceback() {
        let out = r#"
==================================== ERRORS ====================================
_______________________ ERROR collecting tests/test_app.py _______________________
  File "/tmp/work/app.py", line 4
    if x > 1
            ^
SyntaxError: expected ':'
=========================== short test summary info ============================
ERROR tests/test_app.py
"#;
        let failures = parse_indent_output(out);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "/tmp/work/app.py");
        assert_eq!(failures[0].line, 4);
        assert_eq!(failures[0].message, "SyntaxError: expected ':'");
    }

    #[test]
    fn test_python_short_traceback_assert() {
        let out = "\
___________________________________ test_add ___________________________________
tests/test_math.py:5: in test_add
    assert add(1, 2) == 4
E   assert 3 == 4
=========================== short test summary info ============================
FAILED tests/test_math.py::test_add - assert 3 == 4
";
        let failures = parse_indent_output(out);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "tests/test_math.py");
        assert_eq!(failures[0].line, 5);
        assert_eq!(failures[0].message, "E   assert 3 == 4");
    }

    #[test]
    fn test_python_failed_summary_drops_previous_line() {
        let out = "\
tests/test_math.py:5: in test_add
E   assert 3 == 4
FAILED tests/test_io.py::test_read - NameError: name 'x' is not defined
";
        let failures = parse_indent_output(out);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].line, 5);
        assert_eq!(failures[1].file, "tests/test_io.py");
        assert_eq!(failures[1].line, 0);
    }

    #[test]
    fn test_python_module_not_found() {
        let out = "\
  File \"/work/svc/client.py\", line 1, in <module>
    import requests
E   ModuleNotFoundError: No module named 'requests'
";
        let failures = parse_indent_output(out);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "/work/svc/client.py");
        assert_eq!(failures[0].line, 1);
        assert!(failures[0].message.contains("No module named 'requests'"));
    }

    #[test]
    fn test_indent_signature_priority() {
        assert_eq!(
            indent_signature("IndentationError: unexpected indent"),
            Some(Signature::Syntax)
        );
        assert_eq!(
            indent_signature("NameError: name 'x' is not defined"),
            Some(Signature::Type)
        );
        assert_eq!(
            indent_signature("ImportError: cannot import name 'y'"),
            Some(Signature::Module)
        );
        assert_eq!(
            indent_signature("AssertionError: TypeError: mixed"),
            Some(Signature::Type)
        );
        assert_eq!(indent_signature("ValueError: nope"), None);
    }

    #[test]
    fn test_unparseable_output_synthesizes_one_generic() {
        let out = "collected 0 items\nsomething went sideways\n";
        let failures = parse_output(SourceFamily::IndentSensitive, out, false, &cfg());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "unknown");
        assert_eq!(failures[0].line, 0);
        assert_eq!(failures[0].message, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_generic_uses_first_error_like_line() {
        let out = "npm WARN deprecated\nnpm ERR! Missing script: \"test\"\nnpm ERR! more\n";
        let failures = parse_output(SourceFamily::BraceDelimited, out, false, &cfg());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "npm ERR! Missing script: \"test\"");
    }

    #[test]
    fn test_unknown_family_always_generic() {
        let out = "SyntaxError: would match elsewhere";
        let failures = parse_output(SourceFamily::Unknown, out, false, &cfg());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file, "unknown");
    }

    #[test]
    fn test_max_failures_cap() {
        let out = "TypeError: a\nTypeError: b\nTypeError: c\n";
        let config = ParserConfig { max_failures: 2 };
        let failures = parse_output(SourceFamily::BraceDelimited, out, false, &config);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_generic_context_truncated() {
        let out = "x".repeat(2_000);
        let rec = synthesize_generic(&out);
        assert_eq!(rec.raw_context.chars().count(), GENERIC_CONTEXT_CHARS);
    }
}
