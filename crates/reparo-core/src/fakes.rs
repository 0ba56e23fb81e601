//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `ScriptedTestRunner`, `RecordingSourceControl`, `MemorySink` and
//! `MemoryResultStore` so the retry loop can be driven without processes,
//! git or disk.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ProgressEvent, ProgressKind, ReparoError, Result, RunResult, RunSummary};
use crate::events::EventSink;
use crate::runner::{TestRunOutcome, TestRunner};
use crate::scm::{CommitOutcome, SourceControl};
use crate::store::ResultStore;

// ---------------------------------------------------------------------------
// ScriptedTestRunner
// ---------------------------------------------------------------------------

type RunFn = Box<dyn Fn(&Path, u32) -> TestRunOutcome + Send + Sync>;

enum Script {
    /// Outcomes handed out in order; the last one repeats.
    Queue(Mutex<VecDeque<TestRunOutcome>>),
    /// Computed from the working copy and the 1-based call number.
    Func(RunFn),
}

/// Test runner that replays scripted outcomes and counts calls.
pub struct ScriptedTestRunner {
    script: Script,
    calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedTestRunner {
    pub fn new(outcomes: impl IntoIterator<Item = TestRunOutcome>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(outcomes.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always return `outcome`.
    pub fn always(outcome: TestRunOutcome) -> Self {
        Self::new([outcome])
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Path, u32) -> TestRunOutcome + Send + Sync + 'static,
    {
        Self {
            script: Script::Func(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of test executions so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestRunner for ScriptedTestRunner {
    async fn run_tests(&self, workdir: &Path) -> TestRunOutcome {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(workdir.to_path_buf());
            calls.len() as u32
        };
        match &self.script {
            Script::Func(f) => f(workdir, call),
            Script::Queue(queue) => {
                let mut queue = queue.lock().unwrap();
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_else(TestRunOutcome::no_tests)
                } else {
                    queue.front().cloned().unwrap_or_else(TestRunOutcome::no_tests)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSourceControl
// ---------------------------------------------------------------------------

/// One call observed by [`RecordingSourceControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScmCall {
    Acquire(String),
    CreateBranch(String),
    CommitAndPush { branch: String, message: String },
}

/// Source control that hands out a fixed working copy and records calls.
#[derive(Debug)]
pub struct RecordingSourceControl {
    workdir: PathBuf,
    fail_acquire: bool,
    fail_branch: bool,
    commit_outcome: CommitOutcome,
    calls: Mutex<Vec<ScmCall>>,
}

impl RecordingSourceControl {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            fail_acquire: false,
            fail_branch: false,
            commit_outcome: CommitOutcome::Pushed { attempts: 1 },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn failing_branch(mut self) -> Self {
        self.fail_branch = true;
        self
    }

    pub fn with_commit_outcome(mut self, outcome: CommitOutcome) -> Self {
        self.commit_outcome = outcome;
        self
    }

    pub fn calls(&self) -> Vec<ScmCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Messages of every commit requested.
    pub fn commit_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ScmCall::CommitAndPush { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SourceControl for RecordingSourceControl {
    async fn acquire(&self, location: &str) -> Result<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .push(ScmCall::Acquire(location.to_string()));
        if self.fail_acquire {
            return Err(ReparoError::Acquisition(format!(
                "cannot clone {location}"
            )));
        }
        Ok(self.workdir.clone())
    }

    async fn create_branch(&self, _workdir: &Path, branch: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ScmCall::CreateBranch(branch.to_string()));
        if self.fail_branch {
            return Err(ReparoError::Git(format!("branch {branch} already exists")));
        }
        Ok(())
    }

    async fn commit_and_push(
        &self,
        _workdir: &Path,
        branch: &str,
        message: &str,
    ) -> Result<CommitOutcome> {
        self.calls.lock().unwrap().push(ScmCall::CommitAndPush {
            branch: branch.to_string(),
            message: message.to_string(),
        });
        Ok(self.commit_outcome.clone())
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Event sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Kinds of the transition events, notices excluded.
    pub fn transitions(&self) -> Vec<ProgressKind> {
        self.events()
            .into_iter()
            .filter(ProgressEvent::is_transition)
            .map(|e| e.kind)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// MemoryResultStore
// ---------------------------------------------------------------------------

/// In-memory result store with the same write-once contract as the file store.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<Uuid, RunResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &RunResult) -> Result<PathBuf> {
        let mut results = self.results.lock().unwrap();
        if results.contains_key(&result.run_id) {
            return Err(ReparoError::DuplicateRun(result.run_id.to_string()));
        }
        results.insert(result.run_id, result.clone());
        Ok(PathBuf::from(format!("memory://{}", result.run_id)))
    }

    fn load(&self, run_id: &Uuid) -> Result<RunResult> {
        self.results
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .ok_or_else(|| ReparoError::RunNotFound(run_id.to_string()))
    }

    fn list(&self) -> Result<Vec<RunSummary>> {
        let mut summaries: Vec<RunSummary> = self
            .results
            .lock()
            .unwrap()
            .values()
            .map(RunSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_repeats_last() {
        let runner = ScriptedTestRunner::new([
            TestRunOutcome::failed("fake", "boom", Vec::new()),
            TestRunOutcome::passed("fake", "ok"),
        ]);
        let dir = Path::new("/tmp");
        assert!(!runner.run_tests(dir).await.passed);
        assert!(runner.run_tests(dir).await.passed);
        assert!(runner.run_tests(dir).await.passed);
        assert_eq!(runner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_recording_scm_records_calls() {
        let scm = RecordingSourceControl::new("/work");
        let path = scm.acquire("repo").await.unwrap();
        scm.create_branch(&path, "B").await.unwrap();
        scm.commit_and_push(&path, "B", "msg").await.unwrap();
        assert_eq!(
            scm.calls(),
            vec![
                ScmCall::Acquire("repo".to_string()),
                ScmCall::CreateBranch("B".to_string()),
                ScmCall::CommitAndPush {
                    branch: "B".to_string(),
                    message: "msg".to_string()
                },
            ]
        );
    }
}
