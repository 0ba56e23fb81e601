//! Run configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! `REPARO_*` environment variables, then whatever the caller (usually the
//! CLI) sets explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{ReparoError, Result};

/// Default iteration budget.
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Top-level configuration for a remediation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReparoConfig {
    /// Maximum loop iterations before giving up.
    pub retry_limit: u32,

    pub runner: RunnerConfig,

    pub git: GitConfig,

    pub scoring: ScoringConfig,

    pub parser: ParserConfig,

    /// Directory holding persisted result records.
    pub results_dir: PathBuf,
}

impl Default for ReparoConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            runner: RunnerConfig::default(),
            git: GitConfig::default(),
            scoring: ScoringConfig::default(),
            parser: ParserConfig::default(),
            results_dir: PathBuf::from("results"),
        }
    }
}

/// Test execution limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Hard wall-clock limit for one test execution.
    pub test_timeout_secs: u64,

    /// Hard wall-clock limit for dependency installation.
    pub install_timeout_secs: u64,

    /// Captured output beyond this many bytes is dropped.
    pub max_output_bytes: usize,

    /// Interpreter used to launch pytest.
    pub python_bin: String,

    /// Replaces the detected test command when set.
    pub test_command: Option<Vec<String>>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: 180,
            install_timeout_secs: 300,
            max_output_bytes: 256 * 1024,
            python_bin: "python".to_string(),
            test_command: None,
        }
    }
}

/// Source-control behaviour for the git provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Parent directory for cloned working copies.
    pub work_root: PathBuf,

    /// `--depth` passed to clone; `0` clones full history.
    pub clone_depth: u32,

    /// Push attempts before giving up with a warning.
    pub push_attempts: u32,

    /// Fixed delay between push attempts.
    pub push_retry_delay_ms: u64,

    pub author_name: String,

    pub author_email: String,

    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("reparo"),
            clone_depth: 1,
            push_attempts: 3,
            push_retry_delay_ms: 2_000,
            author_name: "AI-AGENT".to_string(),
            author_email: "ai-agent@reparo.dev".to_string(),
            remote: "origin".to_string(),
        }
    }
}

/// Constants for the presentation-only score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub base: i64,

    /// Awarded when the run finishes in under `time_bonus_under_secs`.
    pub time_bonus: i64,

    pub time_bonus_under_secs: u64,

    /// Subtracted per successful fix beyond `commit_penalty_threshold`.
    pub commit_penalty_per_fix: i64,

    pub commit_penalty_threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 100,
            time_bonus: 10,
            time_bonus_under_secs: 300,
            commit_penalty_per_fix: 2,
            commit_penalty_threshold: 20,
        }
    }
}

/// Output parser limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum failure records kept from one run's output.
    pub max_failures: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_failures: 100 }
    }
}

impl ReparoConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load defaults, overlay the TOML file if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `REPARO_*` (and git identity) variables using `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REPARO_RETRY_LIMIT") {
            self.retry_limit = parse_env("REPARO_RETRY_LIMIT", &v)?;
        }
        if let Some(v) = lookup("REPARO_TEST_TIMEOUT_SECS") {
            self.runner.test_timeout_secs = parse_env("REPARO_TEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("REPARO_INSTALL_TIMEOUT_SECS") {
            self.runner.install_timeout_secs = parse_env("REPARO_INSTALL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("REPARO_RESULTS_DIR") {
            self.results_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("REPARO_WORK_ROOT") {
            self.git.work_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("REPARO_PYTHON") {
            self.runner.python_bin = v;
        }
        if let Some(v) = lookup("GIT_COMMIT_AUTHOR_NAME") {
            self.git.author_name = v;
        }
        if let Some(v) = lookup("GIT_COMMIT_AUTHOR_EMAIL") {
            self.git.author_email = v;
        }
        Ok(())
    }

    /// Reject settings that would make the loop or its collaborators misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.retry_limit == 0 {
            return Err(ReparoError::InvalidConfig(
                "retry_limit must be > 0".to_string(),
            ));
        }
        if self.runner.test_timeout_secs == 0 {
            return Err(ReparoError::InvalidConfig(
                "runner.test_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.runner.install_timeout_secs == 0 {
            return Err(ReparoError::InvalidConfig(
                "runner.install_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.runner.max_output_bytes == 0 {
            return Err(ReparoError::InvalidConfig(
                "runner.max_output_bytes must be > 0".to_string(),
            ));
        }
        if matches!(&self.runner.test_command, Some(cmd) if cmd.is_empty()) {
            return Err(ReparoError::InvalidConfig(
                "runner.test_command must not be empty".to_string(),
            ));
        }
        if self.git.push_attempts == 0 {
            return Err(ReparoError::InvalidConfig(
                "git.push_attempts must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ReparoError::InvalidConfig(format!("{key}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ReparoConfig::default();
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.runner.test_timeout_secs, 180);
        assert_eq!(config.runner.install_timeout_secs, 300);
        assert_eq!(config.git.push_attempts, 3);
        assert_eq!(config.git.push_retry_delay_ms, 2_000);
        assert_eq!(config.scoring.base, 100);
        assert_eq!(config.parser.max_failures, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReparoConfig::from_toml_str(
            r#"
retry_limit = 2

[runner]
test_timeout_secs = 30
test_command = ["sh", "-c", "exit 0"]
"#,
        )
        .expect("parse");
        assert_eq!(config.retry_limit, 2);
        assert_eq!(config.runner.test_timeout_secs, 30);
        assert_eq!(config.runner.install_timeout_secs, 300);
        assert_eq!(
            config.runner.test_command.as_deref(),
            Some(&["sh".to_string(), "-c".to_string(), "exit 0".to_string()][..])
        );
        assert_eq!(config.git, GitConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let err = ReparoConfig::from_toml_str("retry_limit = \"many\"").unwrap_err();
        assert!(matches!(err, ReparoError::ConfigParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REPARO_RETRY_LIMIT", "7"),
            ("REPARO_PYTHON", "python3"),
            ("GIT_COMMIT_AUTHOR_NAME", "bot"),
        ]
        .into_iter()
        .collect();

        let mut config = ReparoConfig::default();
        config
            .apply_env_with(|k| vars.get(k).map(|v| v.to_string()))
            .expect("apply env");
        assert_eq!(config.retry_limit, 7);
        assert_eq!(config.runner.python_bin, "python3");
        assert_eq!(config.git.author_name, "bot");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ReparoConfig::default();
        let err = config
            .apply_env_with(|k| (k == "REPARO_RETRY_LIMIT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("REPARO_RETRY_LIMIT"));
    }

    #[test]
    fn test_validate_rejects_zero_retry_limit() {
        let config = ReparoConfig {
            retry_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_command_override() {
        let mut config = ReparoConfig::default();
        config.runner.test_command = Some(Vec::new());
        assert!(config.validate().is_err());
    }
}
