//! Test toolchain detection and the commands each toolchain runs.

use std::path::Path;

use reparo_core::{RunnerConfig, SourceFamily};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Files whose presence marks a pytest project.
const PYTHON_MARKERS: [&str; 3] = ["requirements.txt", "setup.py", "pyproject.toml"];

const NODE_MANIFEST: &str = "package.json";

/// Detected test tooling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Toolchain {
    /// `scripts.test` in package.json
    Npm,

    /// jest declared as a dependency
    Jest,

    /// mocha declared as a dependency
    Mocha,

    /// vitest declared as a dependency
    Vitest,

    /// any Python project descriptor
    Pytest,
}

impl Toolchain {
    /// Runner name reported in outcomes.
    pub fn name(&self) -> &'static str {
        match self {
            Toolchain::Npm => "npm",
            Toolchain::Jest => "jest",
            Toolchain::Mocha => "mocha",
            Toolchain::Vitest => "vitest",
            Toolchain::Pytest => "pytest",
        }
    }

    /// The test command, first element is the executable.
    pub fn command(&self, python_bin: &str) -> Vec<String> {
        let argv: &[&str] = match self {
            Toolchain::Npm => &["npm", "test"],
            Toolchain::Jest => &["npx", "jest", "--ci"],
            Toolchain::Mocha => &["npx", "mocha"],
            Toolchain::Vitest => &["npx", "vitest", "run"],
            Toolchain::Pytest => &[python_bin, "-m", "pytest", "--tb=short"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }

    /// Dependency installation to run before testing, if any.
    pub fn install_command(&self) -> Option<Vec<String>> {
        match self {
            Toolchain::Npm | Toolchain::Jest | Toolchain::Mocha | Toolchain::Vitest => Some(
                [
                    "npm",
                    "install",
                    "--prefer-offline",
                    "--no-audit",
                    "--no-fund",
                    "--loglevel=error",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ),
            Toolchain::Pytest => None,
        }
    }

    /// Grammar the output should be parsed with.
    pub fn family(&self) -> SourceFamily {
        match self {
            Toolchain::Pytest => SourceFamily::IndentSensitive,
            _ => SourceFamily::BraceDelimited,
        }
    }

    /// Inspect marker files in `workdir`.
    ///
    /// A manifest that cannot be parsed still selects [`Toolchain::Npm`] so
    /// the breakage surfaces as a failing run.
    pub fn detect(workdir: &Path) -> Option<Self> {
        let manifest = workdir.join(NODE_MANIFEST);
        if manifest.is_file() {
            match read_manifest(&manifest) {
                Ok(pkg) => {
                    if let Some(toolchain) = from_manifest(&pkg) {
                        return Some(toolchain);
                    }
                }
                Err(e) => {
                    warn!(path = %manifest.display(), error = %e, "Unreadable package.json, assuming npm test");
                    return Some(Toolchain::Npm);
                }
            }
        }

        if PYTHON_MARKERS.iter().any(|m| workdir.join(m).is_file()) {
            return Some(Toolchain::Pytest);
        }

        None
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn from_manifest(pkg: &Value) -> Option<Toolchain> {
    let has_test_script = pkg
        .pointer("/scripts/test")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if has_test_script {
        return Some(Toolchain::Npm);
    }

    let declares = |name: &str| {
        ["dependencies", "devDependencies"]
            .iter()
            .any(|table| pkg.get(table).and_then(|deps| deps.get(name)).is_some())
    };
    [
        ("jest", Toolchain::Jest),
        ("mocha", Toolchain::Mocha),
        ("vitest", Toolchain::Vitest),
    ]
    .into_iter()
    .find(|(dep, _)| declares(dep))
    .map(|(_, toolchain)| toolchain)
}

/// What to execute for one working copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestPlan {
    /// Runner name reported in outcomes.
    pub runner: String,

    /// Test command (first element is executable).
    pub command: Vec<String>,

    /// Optional dependency installation.
    pub install: Option<Vec<String>>,

    pub family: SourceFamily,
}

impl TestPlan {
    /// Plan for `workdir`, or `None` when there is nothing to run.
    ///
    /// A configured `test_command` replaces the detected command and is
    /// reported as `custom`.
    pub fn for_workdir(workdir: &Path, config: &RunnerConfig) -> Option<Self> {
        let detected = Toolchain::detect(workdir);

        if let Some(command) = &config.test_command {
            let family = match detected {
                Some(toolchain) => toolchain.family(),
                None if workdir.join(NODE_MANIFEST).is_file() => SourceFamily::BraceDelimited,
                None => SourceFamily::Unknown,
            };
            return Some(Self {
                runner: "custom".to_string(),
                command: command.clone(),
                install: detected.and_then(|t| t.install_command()),
                family,
            });
        }

        detected.map(|toolchain| Self {
            runner: toolchain.name().to_string(),
            command: toolchain.command(&config.python_bin),
            install: toolchain.install_command(),
            family: toolchain.family(),
        })
    }
}
