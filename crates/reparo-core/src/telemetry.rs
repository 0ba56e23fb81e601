//! Tracing initialisation for Reparo binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored, as
//! the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level. Everything else is
/// held at `warn`.
const REPARO_TARGETS: [&str; 3] = ["reparo", "reparo_core", "reparo_ci"];

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        REPARO_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.as_str().to_ascii_lowercase())),
    );
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: verbosity of the Reparo crates when `RUST_LOG` is not set.
///
/// Logs go to stderr so progress lines and JSON on stdout stay clean.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
