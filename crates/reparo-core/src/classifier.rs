//! Failure classification.
//!
//! Maps each [`FailureRecord`] onto exactly one [`BugCategory`] by testing an
//! ordered list of keyword predicates against the lower-cased message and
//! context. The order is part of the contract: more specific signatures are
//! tested before generic ones, and the first match wins.

use crate::domain::{BugCategory, FailureRecord};

const INDENTATION_SIGNATURES: &[&str] = &[
    "indentationerror",
    "unexpected indent",
    "unindent does not match",
    "taberror",
];

const IMPORT_SIGNATURES: &[&str] = &[
    "importerror",
    "modulenotfounderror",
    "cannot find module",
    "no module named",
    "module-not-found",
    "module not found",
];

const SYNTAX_SIGNATURES: &[&str] = &["syntaxerror", "unexpected token", "invalid syntax"];

const TYPE_SIGNATURES: &[&str] = &[
    "typeerror",
    "is not a function",
    "is not defined",
    "undefined is not",
];

const LOGIC_SIGNATURES: &[&str] = &["assertionerror", "expected", "assert", "received"];

const LINT_SIGNATURES: &[&str] = &["unused", "eslint", "lint", "no-unused"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify one failure. Total: every input gets a category.
pub fn classify(failure: &FailureRecord) -> BugCategory {
    let text = format!("{} {}", failure.message, failure.raw_context).to_lowercase();
    classify_text(&text)
}

/// Classify already-lowercased text.
fn classify_text(text: &str) -> BugCategory {
    if contains_any(text, INDENTATION_SIGNATURES) {
        return BugCategory::Indentation;
    }
    if contains_any(text, IMPORT_SIGNATURES) {
        return BugCategory::Import;
    }
    if contains_any(text, SYNTAX_SIGNATURES) || (text.contains("missing") && text.contains("colon"))
    {
        return BugCategory::Syntax;
    }
    if contains_any(text, TYPE_SIGNATURES) {
        return BugCategory::TypeError;
    }
    if contains_any(text, LOGIC_SIGNATURES) {
        return BugCategory::Logic;
    }
    if contains_any(text, LINT_SIGNATURES) {
        return BugCategory::Linting;
    }

    // Secondary pass on looser keywords.
    if text.contains("import") || text.contains("require") {
        return BugCategory::Import;
    }
    if text.contains("syntax") {
        return BugCategory::Syntax;
    }
    if text.contains("type") {
        return BugCategory::TypeError;
    }
    if text.contains("indent") {
        return BugCategory::Indentation;
    }

    BugCategory::default()
}

/// Classify a batch, keeping input order.
pub fn classify_all(failures: &[FailureRecord]) -> Vec<(FailureRecord, BugCategory)> {
    failures
        .iter()
        .map(|f| (f.clone(), classify(f)))
        .collect()
}
