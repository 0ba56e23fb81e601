//! Append-only persistence of final run records.
//!
//! Layout: `<dir>/<run_id>.json` holding the pretty-printed [`RunResult`]
//! and `<dir>/<run_id>.digest` holding its SHA-256 hex digest. A run id can
//! be written once; loads verify the digest.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{ReparoError, Result, RunResult, RunSummary};

/// Storage for finished runs, keyed by run id.
pub trait ResultStore: Send + Sync {
    /// Persist a result. Fails with `DuplicateRun` if the id already exists.
    fn save(&self, result: &RunResult) -> Result<PathBuf>;

    fn load(&self, run_id: &Uuid) -> Result<RunResult>;

    /// Summaries of every stored run, newest first.
    fn list(&self) -> Result<Vec<RunSummary>>;
}

/// SHA-256 hex digest of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Filesystem-backed [`ResultStore`].
#[derive(Debug, Clone)]
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, run_id: &Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    fn digest_path(&self, run_id: &Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.digest"))
    }

    /// Write `bytes` to `path` atomically, refusing to replace an existing file.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ResultStore for FsResultStore {
    fn save(&self, result: &RunResult) -> Result<PathBuf> {
        let record_path = self.record_path(&result.run_id);
        if record_path.exists() {
            return Err(ReparoError::DuplicateRun(result.run_id.to_string()));
        }

        let json = serde_json::to_vec_pretty(result)?;
        let digest = digest_hex(&json);

        self.write_new(&record_path, &json).map_err(|e| match e {
            ReparoError::Io(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
                ReparoError::DuplicateRun(result.run_id.to_string())
            }
            other => other,
        })?;
        self.write_new(&self.digest_path(&result.run_id), digest.as_bytes())?;

        Ok(record_path)
    }

    fn load(&self, run_id: &Uuid) -> Result<RunResult> {
        let record_path = self.record_path(run_id);
        let json = fs::read(&record_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReparoError::RunNotFound(run_id.to_string())
            } else {
                ReparoError::Io(e)
            }
        })?;

        let expected = fs::read_to_string(self.digest_path(run_id))?;
        let actual = digest_hex(&json);
        if expected.trim() != actual {
            return Err(ReparoError::DigestMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }

        Ok(serde_json::from_slice(&json)?)
    }

    fn list(&self) -> Result<Vec<RunSummary>> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(run_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            match self.load(&run_id) {
                Ok(result) => summaries.push(RunSummary::from(&result)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable result"),
            }
        }
        summaries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(summaries)
    }
}
