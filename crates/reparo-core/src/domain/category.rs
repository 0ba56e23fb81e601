//! Bug categories assigned by the classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of failure categories. Every failure gets exactly one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugCategory {
    Linting,
    Syntax,
    #[default]
    Logic,
    TypeError,
    Import,
    Indentation,
}

impl BugCategory {
    /// All categories, in declaration order.
    pub const ALL: [BugCategory; 6] = [
        BugCategory::Linting,
        BugCategory::Syntax,
        BugCategory::Logic,
        BugCategory::TypeError,
        BugCategory::Import,
        BugCategory::Indentation,
    ];

    /// Upper-case label used in commit messages and reports.
    pub fn label(&self) -> &'static str {
        match self {
            BugCategory::Linting => "LINTING",
            BugCategory::Syntax => "SYNTAX",
            BugCategory::Logic => "LOGIC",
            BugCategory::TypeError => "TYPE_ERROR",
            BugCategory::Import => "IMPORT",
            BugCategory::Indentation => "INDENTATION",
        }
    }
}

impl fmt::Display for BugCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
