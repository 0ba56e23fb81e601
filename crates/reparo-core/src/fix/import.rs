use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::source::SourceFile;
use super::{first_quoted, FixStrategy, FILE_NOT_FOUND};
use crate::domain::{BugCategory, FailureRecord, FixResult, Result, SourceFamily};

/// A line using ES module syntax.
static ES_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(?:.+\s+from\s+)?['"]"#).expect("ES_IMPORT_RE should compile")
});

/// Prepends an import of the module named in the failure message.
#[derive(Debug, Default)]
pub struct ImportStrategy;

/// Patterns that count as an existing import of `module`, in either family.
fn import_patterns(module: &str) -> Vec<Regex> {
    let m = regex::escape(module);
    [
        format!(r"^\s*import\s+{m}(?:\s|,|$)"),
        format!(r"^\s*import\s+.*,\s*{m}(?:\s|,|$)"),
        format!(r"^\s*from\s+{m}\s+import\b"),
        format!(r#"\bfrom\s+['"]{m}['"]"#),
        format!(r#"^\s*import\s+['"]{m}['"]"#),
        format!(r#"\brequire\(\s*['"]{m}['"]\s*\)"#),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

pub(crate) fn already_imported(lines: &[String], module: &str) -> bool {
    let patterns = import_patterns(module);
    lines
        .iter()
        .any(|line| patterns.iter().any(|re| re.is_match(line)))
}

/// Binding name for a brace-delimited import: last path segment as an identifier.
fn binding_name(module: &str) -> Option<String> {
    let segment = module.trim_end_matches('/').rsplit('/').next()?;
    let mut ident: String = segment
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    let ident_trimmed = ident.trim_matches('_');
    if ident_trimmed.is_empty() {
        return None;
    }
    ident = ident_trimmed.to_string();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    Some(ident)
}

fn import_statement(src: &SourceFile, module: &str) -> Option<String> {
    match src.family() {
        SourceFamily::IndentSensitive => Some(format!("import {module}")),
        SourceFamily::BraceDelimited => {
            let ident = binding_name(module)?;
            if src.lines.iter().any(|l| ES_IMPORT_RE.is_match(l)) {
                Some(format!("import {ident} from '{module}';"))
            } else {
                Some(format!("const {ident} = require('{module}');"))
            }
        }
        SourceFamily::Unknown => None,
    }
}

impl FixStrategy for ImportStrategy {
    fn category(&self) -> BugCategory {
        BugCategory::Import
    }

    fn apply(&self, workdir: &Path, failure: &FailureRecord) -> Result<FixResult> {
        let Some(mut src) = SourceFile::open(workdir, failure)? else {
            return Ok(FixResult::failed(FILE_NOT_FOUND));
        };
        let Some(module) = first_quoted(&failure.message) else {
            return Ok(FixResult::failed("Cannot determine missing module"));
        };
        if already_imported(&src.lines, module) {
            return Ok(FixResult::failed("Module already imported"));
        }
        let Some(statement) = import_statement(&src, module) else {
            return Ok(FixResult::failed("Unsupported file type for import fix"));
        };

        src.lines.insert(0, statement);
        src.save()?;
        Ok(FixResult::fixed(format!("Added missing import: {module}")))
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
    fn test_python_import_prepended() {
        let dir = setup("client.py", "def get():\n    return requests.get('x')\n");
        let failure =
            FailureRecord::new("client.py", 1, "ModuleNotFoundError: No module named 'requests'", "");

        let result = ImportStrategy.apply(dir.path(), &failure).unwrap();
        assert_eq!(result, FixResult::fixed("Added missing import: requests"));
        let text = fs::read_to_string(dir.path().join("client.py")).unwrap();
        assert_eq!(text.lines().next(), Some("import requests"));
    }

    #[test]
    fn test_commonjs_require_prepended() {
        let dir = setup("index.js", "const path = require('path');\n");
        let failure = FailureRecord::new("index.js", 3, "Cannot find module 'lodash.merge' from 'index.js'", "");

        assert!(ImportStrategy.apply(dir.path(), &failure).unwrap().is_fixed());
        let text = fs::read_to_string(dir.path().join("index.js")).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("const lodash_merge = require('lodash.merge');")
        );
    }

    #[test]
    fn test_es_module_syntax_followed() {
        let dir = setup("app.ts", "import { a } from './a';\nexport const b = a;\n");
        let failure = FailureRecord::new("app.ts", 1, "Cannot find module '@scope/util'", "");

        assert!(ImportStrategy.apply(dir.path(), &failure).unwrap().is_fixed());
        let text = fs::read_to_string(dir.path().join("app.ts")).unwrap();
        assert_eq!(text.lines().next(), Some("import util from '@scope/util';"));
    }

    #[test]
    fn test_existing_import_is_no_op() {
        let contents = "import os\nfrom requests import Session\n";
        let dir = setup("a.py", contents);
        let failure = FailureRecord::new("a.py", 1, "No module named 'requests'", "");

        assert_eq!(
            ImportStrategy.apply(dir.path(), &failure).unwrap(),
            FixResult::failed("Module already imported")
        );
        assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), contents);
    }

    #[test]
    fn test_similar_names_are_not_imports() {
        let lines = vec!["import requests_toolbelt".to_string()];
        assert!(!already_imported(&lines, "requests"));
        let lines = vec!["import os, requests".to_string()];
        assert!(already_imported(&lines, "requests"));
        let lines = vec!["const x = require(\"lodash\");".to_string()];
        assert!(already_imported(&lines, "lodash"));
    }

    #[test]
    fn test_message_without_module_fails() {
        let dir = setup("a.py", "x = 1\n");
        let failure = FailureRecord::new("a.py", 1, "ImportError: bad things", "");
        assert_eq!(
            ImportStrategy.apply(dir.path(), &failure).unwrap(),
            FixResult::failed("Cannot determine missing module")
        );
    }

    #[test]
    fn test_binding_name() {
        assert_eq!(binding_name("lodash").as_deref(), Some("lodash"));
        assert_eq!(binding_name("lodash/fp").as_deref(), Some("fp"));
        assert_eq!(binding_name("./utils/").as_deref(), Some("utils"));
        assert_eq!(binding_name("2d-array").as_deref(), Some("_2d_array"));
        assert_eq!(binding_name("---"), None);
    }
}
