use std::path::Path;

use super::source::{leading_whitespace, SourceFile};
use super::{FixStrategy, FILE_NOT_FOUND, INVALID_LINE};
use crate::domain::{BugCategory, FailureRecord, FixResult, Result, SourceFamily};

/// One indent level for indent-sensitive files.
const INDENT_UNIT: &str = "    ";

/// Spaces substituted for each leading tab in brace-delimited files.
const TAB_WIDTH: usize = 2;

/// Re-indents a line (indent-sensitive) or normalises tabs (brace-delimited).
#[derive(Debug, Default)]
pub struct IndentationStrategy;

fn reindent_line(src: &mut SourceFile, index: usize) -> Option<()> {
    let content = src.lines[index].trim_start().to_string();
    if content.is_empty() {
        return None;
    }

    let previous = src.lines[..index]
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(String::as_str)
        .unwrap_or("");
    let mut indent = leading_whitespace(previous).to_string();
    if previous.trim_end().ends_with(':') {
        indent.push_str(INDENT_UNIT);
    }

    let updated = format!("{indent}{content}");
    if updated == src.lines[index] {
        return None;
    }
    src.lines[index] = updated;
    Some(())
}

fn expand_leading_tabs(src: &mut SourceFile) -> usize {
    let spaces = " ".repeat(TAB_WIDTH);
    let mut changed = 0;
    for line in src.lines.iter_mut() {
        let tabs = line.len() - line.trim_start_matches('\t').len();
        if tabs > 0 {
            *line = format!("{}{}", spaces.repeat(tabs), &line[tabs..]);
            changed += 1;
        }
    }
    changed
}

impl FixStrategy for IndentationStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::Indentation
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let Some(mut src) = SourceFile::open(workdir, failure)? else {
            return Ok(FixResult::failed(FILE_NOT_FOUND));
        };

        match src.family() {
            SourceFamily::IndentSensitive => {
                let Some(index) = src.target_index(failure) else {
                    return Ok(FixResult::failed(INVALID_LINE));
                };
                if reindent_line(&mut src, index).is_none() {
                    return Ok(FixResult::failed("Indentation already consistent"));
                }
                src.save()?;
                Ok(FixResult::fixed("Fixed indentation"))
            }
            SourceFamily::BraceDelimited => {
                if expand_leading_tabs(&mut src) == 0 {
                    return Ok(FixResult::failed("No tab indentation to normalise"));
                }
                src.save()?;
                Ok(FixResult::fixed(format!(
                    "Normalized indentation to {TAB_WIDTH} spaces"
                )))
            }
            SourceFamily::Unknown => Ok(FixResult::failed(
                "Unknown file type for indentation fix",
            )),
        }
    }
}
