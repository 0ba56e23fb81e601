//! LocalTestRunner against scratch working copies.
//!
//! Commands are supplied through the `test_command` override so no Node or
//! Python toolchain is needed on the host.

use std::fs;
use std::path::Path;

use reparo_ci::LocalTestRunner;
use reparo_core::{ParserConfig, RunnerConfig, SourceFamily, TestRunner};

fn runner_with(script: &str, configure: impl FnOnce(&mut RunnerConfig)) -> LocalTestRunner {
    let mut config = RunnerConfig {
        test_command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
        ]),
        ..RunnerConfig::default()
    };
    configure(&mut config);
    LocalTestRunner::new(config, ParserConfig::default())
}

fn python_project(dir: &Path) {
    fs::write(dir.join("requirements.txt"), "pytest\n").unwrap();
}

#[tokio::test]
async fn no_tooling_is_a_pass() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = LocalTestRunner::default().run_tests(dir.path()).await;
    assert!(outcome.passed);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.runner, "none");
}

#[tokio::test]
async fn zero_exit_passes_with_no_failures() {
    let dir = tempfile::tempdir().unwrap();
    python_project(dir.path());
    let outcome = runner_with("echo '1 passed'", |_| {})
        .run_tests(dir.path())
        .await;
    assert!(outcome.passed);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.runner, "custom");
    assert_eq!(outcome.family, SourceFamily::IndentSensitive);
    assert!(outcome.raw_output.contains("1 passed"));
}

#[tokio::test]
async fn python_traceback_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    python_project(dir.path());
    let script = r#"printf '  File "app.py", line 4\n    if x > 1\n            ^\nSyntaxError: invalid syntax\n'; exit 1"#;
    let outcome = runner_with(script, |_| {}).run_tests(dir.path()).await;

    assert!(!outcome.passed);
    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.file, "app.py");
    assert_eq!(failure.line, 4);
    assert_eq!(failure.message, "SyntaxError: invalid syntax");
}

#[tokio::test]
async fn unrecognised_failure_yields_generic_record() {
    let dir = tempfile::tempdir().unwrap();
    python_project(dir.path());
    let outcome = runner_with("echo 'collection failed'; exit 2", |_| {})
        .run_tests(dir.path())
        .await;

    assert!(!outcome.passed);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].file, "unknown");
    assert_eq!(outcome.failures[0].message, "collection failed");
}

#[tokio::test]
async fn timeout_becomes_failed_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = runner_with("sleep 10", |c| c.test_timeout_secs = 1)
        .run_tests(dir.path())
        .await;

    assert!(!outcome.passed);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].message.contains("timed out"));
}

#[tokio::test]
async fn spawn_error_becomes_failed_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunnerConfig {
        test_command: Some(vec!["reparo-definitely-missing-binary".to_string()]),
        ..RunnerConfig::default()
    };
    let outcome = LocalTestRunner::new(config, ParserConfig::default())
        .run_tests(dir.path())
        .await;

    assert!(!outcome.passed);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].message.contains("failed to spawn"));
}

#[tokio::test]
async fn output_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = runner_with("yes x | head -n 1000; exit 1", |c| c.max_output_bytes = 64)
        .run_tests(dir.path())
        .await;

    assert!(!outcome.passed);
    assert_eq!(outcome.raw_output.len(), 64);
}
