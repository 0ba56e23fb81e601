//! Reparo - automated test-failure remediation CLI
//!
//! ## Commands
//!
//! - `run`: clone a repository, fix failing tests and push the fixes
//! - `results`: list or show persisted run results
//! - `classify`: categorise a single failure message
//! - `parse`: extract failure records from a saved test log

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reparo_ci::LocalTestRunner;
use reparo_core::{
    classify, classify_all, init_tracing, parse_output, ChannelSink, FailureRecord,
    FsResultStore, GitSourceControl, LocalCheckout, ProgressEvent, ReparoConfig, ResultStore,
    RetryCoordinator, RunRequest, RunResult, RunSpan, RunStatus, SourceControl, SourceFamily,
};
use tracing::{info, warn, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "reparo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a repository's tests, fix what fails, push the fixes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "REPARO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remediation loop against a repository
    Run {
        /// Repository URL (or a local directory with --local)
        #[arg(long)]
        repo: String,

        /// Team name, used in the fix branch name
        #[arg(long)]
        team: String,

        /// Team leader name, used in the fix branch name
        #[arg(long)]
        leader: String,

        /// Maximum loop iterations
        #[arg(long)]
        retry_limit: Option<u32>,

        /// Work in place on a local directory instead of cloning; never commits
        #[arg(long)]
        local: bool,

        /// Directory for persisted results
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Print progress events as JSON lines
        #[arg(long)]
        events_json: bool,
    },

    /// Inspect persisted run results
    Results {
        /// Directory holding persisted results
        #[arg(long)]
        results_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: ResultsAction,
    },

    /// Classify one failure message
    Classify {
        /// Failure message
        #[arg(short, long)]
        message: String,

        /// Surrounding output
        #[arg(short, long, default_value = "")]
        context: String,
    },

    /// Parse a saved test log into classified failure records
    Parse {
        /// Grammar to parse with
        #[arg(long, value_enum)]
        family: FamilyArg,

        /// Log file
        log_file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ResultsAction {
    /// List results, newest first
    List,

    /// Show one result as JSON
    Show {
        /// Run ID
        run_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FamilyArg {
    Python,
    Node,
}

impl From<FamilyArg> for SourceFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Python => SourceFamily::IndentSensitive,
            FamilyArg::Node => SourceFamily::BraceDelimited,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = ReparoConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            repo,
            team,
            leader,
            retry_limit,
            local,
            results_dir,
            events_json,
        } => {
            let config = with_overrides(config, retry_limit, results_dir)?;
            let request = RunRequest::new(repo, team, leader);
            let result = cmd_run(config, &request, local, events_json).await?;
            Ok(match result.status {
                RunStatus::Passed => ExitCode::SUCCESS,
                RunStatus::Exhausted => ExitCode::FAILURE,
            })
        }
        Commands::Results {
            results_dir,
            action,
        } => {
            let config = with_overrides(config, None, results_dir)?;
            let store = FsResultStore::new(&config.results_dir)
                .with_context(|| format!("Failed to open results dir {:?}", config.results_dir))?;
            match action {
                ResultsAction::List => cmd_results_list(&store)?,
                ResultsAction::Show { run_id } => cmd_results_show(&store, &run_id)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Classify { message, context } => {
            cmd_classify(&message, &context);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Parse { family, log_file } => {
            cmd_parse(&config, family.into(), &log_file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Apply command-line flags on top of the loaded configuration.
fn with_overrides(
    mut config: ReparoConfig,
    retry_limit: Option<u32>,
    results_dir: Option<PathBuf>,
) -> Result<ReparoConfig> {
    if let Some(limit) = retry_limit {
        config.retry_limit = limit;
    }
    if let Some(dir) = results_dir {
        config.results_dir = dir;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_run(
    config: ReparoConfig,
    request: &RunRequest,
    local: bool,
    events_json: bool,
) -> Result<RunResult> {
    let store = FsResultStore::new(&config.results_dir)
        .with_context(|| format!("Failed to open results dir {:?}", config.results_dir))?;

    let scm: Arc<dyn SourceControl> = if local {
        Arc::new(LocalCheckout)
    } else {
        Arc::new(GitSourceControl::new(config.git.clone()).with_env_token())
    };
    let runner = Arc::new(LocalTestRunner::from_config(&config));
    let (sink, mut events) = ChannelSink::new();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, events_json);
        }
    });

    let coordinator = RetryCoordinator::new(runner, scm, Arc::new(sink), config);
    let outcome = coordinator.run(request).await;
    // Closing the channel lets the printer drain and stop.
    drop(coordinator);
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer stopped unexpectedly");
    }

    let result = outcome.context("Remediation run failed")?;

    let path = {
        let _span = RunSpan::enter(&result.run_id.to_string());
        store.save(&result).context("Failed to save run result")?
    };
    info!(path = %path.display(), "Run result saved");

    if events_json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(result)
}

fn print_event(event: &ProgressEvent, as_json: bool) {
    if as_json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to serialize progress event"),
        }
    } else {
        println!("[{}] {}", event.timestamp.format("%H:%M:%S"), event.message);
    }
}

fn print_summary(result: &RunResult) {
    println!();
    println!("Run ID: {}", result.run_id);
    println!("Branch: {}", result.branch_name);
    println!(
        "Status: {}",
        match result.status {
            RunStatus::Passed => "✓ PASSED",
            RunStatus::Exhausted => "✗ EXHAUSTED",
        }
    );
    println!(
        "Iterations: {}/{}  Failures seen: {}  Fixes applied: {}",
        result.iterations, result.max_iterations, result.total_failures, result.total_fixes
    );
    println!(
        "Score: {} (base {}, time bonus {}, commit penalty {})",
        result.score,
        result.score_breakdown.base,
        result.score_breakdown.time_bonus,
        result.score_breakdown.commit_penalty
    );
    println!("Elapsed: {}s", result.elapsed_secs);

    if !result.fixes.is_empty() {
        println!();
        for fix in &result.fixes {
            println!(
                "  {} {} {}:{} {}",
                if fix.is_fixed() { "✓" } else { "✗" },
                fix.category,
                fix.file,
                fix.line,
                fix.action
            );
        }
    }

    for warning in &result.warnings {
        println!("warning: {warning}");
    }
}

fn cmd_results_list(store: &dyn ResultStore) -> Result<()> {
    let summaries = store.list().context("Failed to list results")?;
    if summaries.is_empty() {
        println!("No results recorded");
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{}  {:<9} score {:>4}  fixes {:>3}  {}s  {}  {}",
            summary.run_id,
            format!("{:?}", summary.status).to_uppercase(),
            summary.score,
            summary.total_fixes,
            summary.elapsed_secs,
            summary.finished_at.format("%Y-%m-%d %H:%M:%S"),
            summary.branch_name
        );
    }
    Ok(())
}

fn cmd_results_show(store: &dyn ResultStore, run_id: &str) -> Result<()> {
    let id = Uuid::parse_str(run_id).with_context(|| format!("Invalid run id: {run_id}"))?;
    let result = store
        .load(&id)
        .with_context(|| format!("Failed to load run {run_id}"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_classify(message: &str, context: &str) {
    let record = FailureRecord::generic(message, context);
    println!("{}", classify(&record));
}

fn cmd_parse(config: &ReparoConfig, family: SourceFamily, log_file: &Path) -> Result<()> {
    let output = std::fs::read_to_string(log_file)
        .with_context(|| format!("Failed to read log file: {:?}", log_file))?;
    let failures = parse_output(family, &output, false, &config.parser);
    let rows: Vec<serde_json::Value> = classify_all(&failures)
        .into_iter()
        .map(|(record, category)| {
            serde_json::json!({
                "file": record.file,
                "line": record.line,
                "message": record.message,
                "category": category,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
