//! Failure records extracted from test output.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// File name used when the output carries no usable location.
pub const UNKNOWN_FILE: &str = "unknown";

/// Language family of a project or a single source file.
///
/// The family selects the output grammar used by the parser and the
/// syntax used by fix strategies (comment markers, import statements,
/// indentation rules).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    /// Statements end with semicolons, blocks are delimited by braces.
    BraceDelimited,
    /// Blocks are opened by a trailing colon and scoped by indentation.
    IndentSensitive,
    Unknown,
}

impl SourceFamily {
    /// Infer the family of a single file from its extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("py") => SourceFamily::IndentSensitive,
            Some("js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs") => SourceFamily::BraceDelimited,
            _ => SourceFamily::Unknown,
        }
    }

    /// Line-comment marker, if the family has one.
    pub fn comment_marker(&self) -> Option<&'static str> {
        match self {
            SourceFamily::BraceDelimited => Some("//"),
            SourceFamily::IndentSensitive => Some("#"),
            SourceFamily::Unknown => None,
        }
    }
}

/// One observation extracted from a failing test run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    /// Implicated file as reported by the tool (absolute or relative).
    pub file: String,

    /// 1-indexed line number; `0` when the output carried no location.
    pub line: u32,

    /// The matched message line, trimmed.
    pub message: String,

    /// Bounded window of output lines surrounding the message.
    pub raw_context: String,
}

impl FailureRecord {
    pub fn new(
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
        raw_context: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
            raw_context: raw_context.into(),
        }
    }

    /// A record with no location, used for spawn errors and unparseable output.
    pub fn generic(message: impl Into<String>, raw_context: impl Into<String>) -> Self {
        Self::new(UNKNOWN_FILE, 0, message, raw_context)
    }

    /// Zero-based line index, or `None` when the line is unknown.
    pub fn line_index(&self) -> Option<usize> {
        (self.line > 0).then(|| self.line as usize - 1)
    }

    /// File name without directories, for commit messages.
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file)
    }
}
