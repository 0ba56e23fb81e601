//! Bounded child-process execution of a working copy's test suite.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reparo_core::{parse_output, ParserConfig, ReparoConfig, RunnerConfig, TestRunOutcome, TestRunner};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::toolchain::TestPlan;

/// Captured result of one child process.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Stdout followed by stderr, truncated.
    pub output: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    pub success: bool,
}

const READ_CHUNK_BYTES: usize = 8192;

/// Drain `reader` to EOF, keeping at most `cap` bytes.
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, cap: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(kept);
    };
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(kept);
        }
        let room = cap.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
}

/// Run `command` in `workdir` with `CI=true` and a hard timeout.
///
/// Each stream is held to `max_output_bytes` while it is read. The child is
/// killed when the timeout drops its handle.
pub async fn execute(
    workdir: &Path,
    command: &[String],
    timeout_secs: u64,
    max_output_bytes: usize,
) -> anyhow::Result<CapturedOutput> {
    let start = Instant::now();

    let Some((exe, args)) = command.split_first() else {
        anyhow::bail!("empty command");
    };

    let mut child = Command::new(exe)
        .args(args)
        .current_dir(workdir)
        .env("CI", "true")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {exe}"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let collect = async {
        let (out, err, status) = tokio::join!(
            read_capped(stdout, max_output_bytes),
            read_capped(stderr, max_output_bytes),
            child.wait(),
        );
        Ok::<_, std::io::Error>((out?, err?, status?))
    };

    let (stdout, stderr, status) = tokio::time::timeout(Duration::from_secs(timeout_secs), collect)
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "{} timed out after {} seconds",
                command.join(" "),
                timeout_secs
            )
        })??;

    let mut combined = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }

    Ok(CapturedOutput {
        exit_code: status.code().unwrap_or(-1),
        output: truncate_output(combined, max_output_bytes),
        duration_ms: start.elapsed().as_millis() as u64,
        success: status.success(),
    })
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate_output(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

/// [`TestRunner`] that detects tooling and runs it as a local process.
#[derive(Debug, Clone, Default)]
pub struct LocalTestRunner {
    runner: RunnerConfig,
    parser: ParserConfig,
}

impl LocalTestRunner {
    pub fn new(runner: RunnerConfig, parser: ParserConfig) -> Self {
        Self { runner, parser }
    }

    pub fn from_config(config: &ReparoConfig) -> Self {
        Self::new(config.runner.clone(), config.parser.clone())
    }

    async fn install(&self, workdir: &Path, command: &[String]) {
        info!(command = %command.join(" "), "Installing dependencies");
        match execute(
            workdir,
            command,
            self.runner.install_timeout_secs,
            self.runner.max_output_bytes,
        )
        .await
        {
            Ok(captured) if captured.success => {
                debug!(duration_ms = captured.duration_ms, "Dependencies installed");
            }
            Ok(captured) => {
                warn!(
                    exit_code = captured.exit_code,
                    "Dependency installation failed, running tests anyway"
                );
            }
            Err(e) => {
                warn!(error = %e, "Dependency installation failed, running tests anyway");
            }
        }
    }
}

#[async_trait]
impl TestRunner for LocalTestRunner {
    async fn run_tests(&self, workdir: &Path) -> TestRunOutcome {
        let Some(plan) = TestPlan::for_workdir(workdir, &self.runner) else {
            info!(workdir = %workdir.display(), "No test tooling detected");
            return TestRunOutcome::no_tests();
        };

        if let Some(install) = &plan.install {
            self.install(workdir, install).await;
        }

        info!(runner = %plan.runner, command = %plan.command.join(" "), "Running tests");
        let start = Instant::now();
        match execute(
            workdir,
            &plan.command,
            self.runner.test_timeout_secs,
            self.runner.max_output_bytes,
        )
        .await
        {
            Ok(captured) => {
                let outcome = if captured.success {
                    TestRunOutcome::passed(plan.runner, captured.output)
                } else {
                    let failures =
                        parse_output(plan.family, &captured.output, false, &self.parser);
                    TestRunOutcome::failed(plan.runner, captured.output, failures)
                };
                debug!(
                    exit_code = captured.exit_code,
                    failures = outcome.failures.len(),
                    "Test run finished"
                );
                outcome
                    .with_family(plan.family)
                    .with_duration_ms(captured.duration_ms)
            }
            Err(e) => {
                warn!(runner = %plan.runner, error = %e, "Test run did not complete");
                TestRunOutcome::errored(plan.runner, e.to_string())
                    .with_family(plan.family)
                    .with_duration_ms(start.elapsed().as_millis() as u64)
            }
        }
    }
}
