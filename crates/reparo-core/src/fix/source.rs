//! Whole-file source access for fix strategies.
//!
//! A [`SourceFile`] is read fully into memory, edited line by line and
//! written back in one piece through a temporary file persisted over the
//! original, so a strategy either leaves the file untouched or replaces it
//! completely.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{FailureRecord, Result, SourceFamily, UNKNOWN_FILE};

/// An in-memory copy of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    pub lines: Vec<String>,
    line_ending: &'static str,
    trailing_newline: bool,
    family: SourceFamily,
}

/// Resolve a reported file name to a path inside `workdir`.
///
/// Accepts absolute paths and paths relative to the working copy. Returns
/// `None` when the file does not exist, is not a regular file, or resolves
/// outside the working copy.
pub fn resolve_path(workdir: &Path, file: &str) -> Option<PathBuf> {
    if file.is_empty() || file == UNKNOWN_FILE {
        return None;
    }
    let candidate = Path::new(file);
    let candidate = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workdir.join(candidate)
    };

    let root = workdir.canonicalize().ok()?;
    let resolved = candidate.canonicalize().ok()?;
    (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
}

impl SourceFile {
    /// Parse file contents, remembering line-ending style.
    pub fn from_contents(path: impl Into<PathBuf>, contents: &str) -> Self {
        let path = path.into();
        let line_ending = if contents.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            family: SourceFamily::from_path(&path),
            lines: contents.lines().map(str::to_string).collect(),
            trailing_newline: contents.ends_with('\n'),
            line_ending,
            path,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_contents(path, &contents))
    }

    /// Load the file a failure points at, or `None` if it cannot be resolved.
    pub fn open(workdir: &Path, failure: &FailureRecord) -> Result<Option<Self>> {
        match resolve_path(workdir, &failure.file) {
            Some(path) => Self::load(&path).map(Some),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn family(&self) -> SourceFamily {
        self.family
    }

    /// Zero-based index of the failure's line, if it lies within the file.
    pub fn target_index(&self, failure: &FailureRecord) -> Option<usize> {
        failure.line_index().filter(|&i| i < self.lines.len())
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.line_ending);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(self.line_ending);
        }
        out
    }

    /// Atomically replace the file on disk with the current contents.
    pub fn save(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let permissions = fs::metadata(&self.path)?.permissions();

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(self.render().as_bytes())?;
        tmp.flush()?;
        fs::set_permissions(tmp.path(), permissions)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Split a line into code and trailing comment at the first `marker` that is
/// not inside a string literal. The comment keeps its marker.
pub fn split_comment<'a>(line: &'a str, marker: &str) -> (&'a str, &'a str) {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            _ if line[i..].starts_with(marker) => return (&line[..i], &line[i..]),
            _ => {}
        }
    }
    (line, "")
}

/// Leading whitespace of a line.
pub fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
