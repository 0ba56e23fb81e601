//! Source-control collaborator.
//!
//! The retry loop obtains a working copy, branches it and hands successful
//! fixes back through this trait. The git-backed provider lives in
//! [`crate::git`]; [`LocalCheckout`] works in place without committing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ReparoError, Result};
use crate::git::{capture_head_sha, is_git_repo};

/// What happened when fixes were handed to source control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// The working tree was clean.
    NothingToCommit,
    /// The provider does not record changes (in-place checkouts).
    Skipped,
    /// Committed and pushed on the given attempt.
    Pushed { attempts: u32 },
    /// Committed locally, but every push attempt failed.
    PushFailed { attempts: u32, error: String },
}

impl CommitOutcome {
    /// Warning text for outcomes the run record should surface.
    pub fn warning(&self, branch: &str) -> Option<String> {
        match self {
            CommitOutcome::PushFailed { attempts, error } => Some(format!(
                "push to {branch} failed after {attempts} attempt(s): {error} (fix kept in local commit)"
            )),
            _ => None,
        }
    }
}

/// Acquires, branches and commits working copies.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Obtain a working copy for `location`. Failure aborts the run.
    async fn acquire(&self, location: &str) -> Result<PathBuf>;

    async fn create_branch(&self, workdir: &Path, branch: &str) -> Result<()>;

    /// Commit all pending changes and push `branch`.
    ///
    /// A clean tree is `NothingToCommit`, not an error, and repeated calls
    /// are allowed.
    async fn commit_and_push(
        &self,
        workdir: &Path,
        branch: &str,
        message: &str,
    ) -> Result<CommitOutcome>;
}

/// HEAD of `dir`, or `None` outside a git work tree. Blocks on `git`.
fn read_head(dir: &Path) -> Option<Result<String>> {
    is_git_repo(dir).then(|| capture_head_sha(dir))
}

/// Uses an existing directory as the working copy and never commits.
#[derive(Debug, Default, Clone)]
pub struct LocalCheckout;

#[async_trait]
impl SourceControl for LocalCheckout {
    async fn acquire(&self, location: &str) -> Result<PathBuf> {
        let path = Path::new(location)
            .canonicalize()
            .map_err(|e| ReparoError::Acquisition(format!("{location}: {e}")))?;
        if !path.is_dir() {
            return Err(ReparoError::Acquisition(format!(
                "{location} is not a directory"
            )));
        }
        let dir = path.clone();
        match tokio::task::spawn_blocking(move || read_head(&dir)).await {
            Ok(Some(Ok(sha))) => info!(workdir = %path.display(), head = %sha, "local checkout"),
            Ok(Some(Err(e))) => {
                warn!(workdir = %path.display(), error = %e, "local checkout without HEAD")
            }
            Ok(None) => info!(workdir = %path.display(), "local checkout is not a git work tree"),
            Err(e) => warn!(workdir = %path.display(), error = %e, "git inspection task failed"),
        }
        Ok(path)
    }

    async fn create_branch(&self, workdir: &Path, branch: &str) -> Result<()> {
        info!(workdir = %workdir.display(), branch, "local checkout, branch not created");
        Ok(())
    }

    async fn commit_and_push(
        &self,
        _workdir: &Path,
        _branch: &str,
        message: &str,
    ) -> Result<CommitOutcome> {
        info!(message, "local checkout, changes left uncommitted");
        Ok(CommitOutcome::Skipped)
    }
}
