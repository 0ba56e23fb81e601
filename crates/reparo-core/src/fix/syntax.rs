use std::path::Path;

use super::source::{split_comment, SourceFile};
use super::{FixStrategy, FILE_NOT_FOUND, INVALID_LINE};
use crate::domain::{BugCategory, FailureRecord, FixResult, Result, SourceFamily};

/// Keywords that open a block ending in `:` in indent-sensitive code.
const BLOCK_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "def", "class", "try", "except", "finally", "with",
];

/// Appends a missing block colon or statement terminator.
#[derive(Debug, Default)]
pub struct SyntaxStrategy;

fn implies_missing_colon(msg: &str) -> bool {
    msg.contains("missing colon")
        || msg.contains("invalid syntax")
        || msg.contains("expected ':'")
        || msg.contains("expected \":\"")
}

fn implies_missing_terminator(msg: &str) -> bool {
    msg.contains("expected ;")
        || msg.contains("missing ;")
        || msg.contains("missing semicolon")
        || msg.contains("';' expected")
        || msg.contains("expected ';'")
}

fn opens_block(code: &str) -> bool {
    let code = code.trim_start();
    BLOCK_KEYWORDS.iter().any(|kw| {
        code.strip_prefix(kw).is_some_and(|rest| {
            rest.chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
        })
    })
}

fn rejoin(code: &str, suffix: char, comment: &str) -> String {
    if comment.is_empty() {
        format!("{code}{suffix}")
    } else {
        format!("{code}{suffix} {comment}")
    }
}

impl FixStrategy for SyntaxStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::Syntax
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let Some(mut src) = SourceFile::open(workdir, failure)? else {
            return Ok(FixResult::failed(FILE_NOT_FOUND));
        };
        let Some(index) = src.target_index(failure) else {
            return Ok(FixResult::failed(INVALID_LINE));
        };

        let family = src.family();
        let line = src.lines[index].clone();
        let (code, comment) = match family.comment_marker() {
            Some(marker) => split_comment(&line, marker),
            None => (line.as_str(), ""),
        };
        let code = code.trim_end();
        let msg = failure.message.to_lowercase();

        if family != SourceFamily::BraceDelimited
            && implies_missing_colon(&msg)
            && opens_block(code)
            && !code.ends_with(':')
        {
            src.lines[index] = rejoin(code, ':', comment);
            src.save()?;
            return Ok(FixResult::fixed("Added missing colon"));
        }

        if family != SourceFamily::IndentSensitive
            && implies_missing_terminator(&msg)
            && !code.is_empty()
            && !code.ends_with([';', '{', '}'])
        {
            src.lines[index] = rejoin(code, ';', comment);
            src.save()?;
            return Ok(FixResult::fixed("Added missing semicolon"));
        }

        if msg.contains("unexpected token") || msg.contains("unexpected end") {
            return Ok(FixResult::failed(
                "Complex syntax error requires manual fix",
            ));
        }
        Ok(FixResult::failed("No applicable syntax fix"))
    }
}
