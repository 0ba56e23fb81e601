//! Git-backed source control and repository helpers.
//!
//! [`GitSourceControl`] shells out to the `git` CLI through `tokio::process`.
//! Clones land in a unique directory under the configured work root and are
//! left on disk after the run.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GitConfig;
use crate::domain::error::{ReparoError, Result};
use crate::scm::{CommitOutcome, SourceControl};

const GITHUB_HTTPS_PREFIX: &str = "https://github.com/";

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory. Returns an error if the
/// directory is not inside a git repository or if git is not available.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| ReparoError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReparoError::Git(format!(
            "git rev-parse HEAD failed: {stderr}"
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(ReparoError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }

    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Rewrite a GitHub HTTPS URL to carry `token` as credentials.
pub fn authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix(GITHUB_HTTPS_PREFIX)) {
        (Some(token), Some(rest)) if !token.is_empty() => {
            format!("https://{token}@github.com/{rest}")
        }
        _ => url.to_string(),
    }
}

/// Directory name for a clone of `url`: sanitised, bounded, unique.
fn checkout_dir_name(url: &str) -> String {
    let mut safe: String = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    if safe.len() > 64 {
        safe = safe[safe.len() - 64..].to_string();
    }
    format!("{safe}_{}", Uuid::new_v4().simple())
}

/// Source control over the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitSourceControl {
    config: GitConfig,
    token: Option<String>,
}

impl GitSourceControl {
    pub fn new(config: GitConfig) -> Self {
        Self {
            config,
            token: None,
        }
    }

    /// Read `GITHUB_TOKEN` from the environment for authenticated clones.
    pub fn with_env_token(mut self) -> Self {
        self.token = std::env::var("GITHUB_TOKEN").ok();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Run git in `dir`, returning stdout or a `Git` error carrying stderr.
    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReparoError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReparoError::Git(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn push_with_retries(&self, workdir: &Path, branch: &str) -> CommitOutcome {
        let attempts = self.config.push_attempts.max(1);
        let delay = Duration::from_millis(self.config.push_retry_delay_ms);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            info!(branch, attempt, attempts, "pushing");
            match self
                .git(
                    workdir,
                    &["push", "--set-upstream", &self.config.remote, branch],
                )
                .await
            {
                Ok(_) => return CommitOutcome::Pushed { attempts: attempt },
                Err(e) => {
                    warn!(branch, attempt, error = %e, "push failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        CommitOutcome::PushFailed {
            attempts,
            error: last_error,
        }
    }
}

#[async_trait]
impl SourceControl for GitSourceControl {
    async fn acquire(&self, location: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.config.work_root).await?;
        let target = self.config.work_root.join(checkout_dir_name(location));
        let target_str = target.to_string_lossy().to_string();
        let url = authenticated_url(location, self.token.as_deref());

        let depth = self.config.clone_depth.to_string();
        let mut args = vec!["clone"];
        if self.config.clone_depth > 0 {
            args.extend(["--depth", depth.as_str()]);
        }
        args.extend([url.as_str(), target_str.as_str()]);

        info!(repo = location, target = %target.display(), "cloning");
        self.git(&self.config.work_root, &args)
            .await
            .map_err(|e| {
                // Never leak the token through the error text.
                let text = match &self.token {
                    Some(t) if !t.is_empty() => e.to_string().replace(t.as_str(), "***"),
                    _ => e.to_string(),
                };
                ReparoError::Acquisition(text)
            })?;
        Ok(target)
    }

    async fn create_branch(&self, workdir: &Path, branch: &str) -> Result<()> {
        self.git(workdir, &["checkout", "-b", branch]).await?;
        info!(branch, "branch created");
        Ok(())
    }

    async fn commit_and_push(
        &self,
        workdir: &Path,
        branch: &str,
        message: &str,
    ) -> Result<CommitOutcome> {
        self.git(workdir, &["config", "user.email", &self.config.author_email])
            .await?;
        self.git(workdir, &["config", "user.name", &self.config.author_name])
            .await?;
        self.git(workdir, &["add", "-A"]).await?;

        let status = self.git(workdir, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }

        self.git(workdir, &["commit", "-m", message]).await?;
        Ok(self.push_with_retries(workdir, branch).await)
    }
}
