//! Domain-level error taxonomy for Reparo.

/// Reparo domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ReparoError {
    #[error("source acquisition failed: {0}")]
    Acquisition(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run already recorded: {0}")]
    DuplicateRun(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Reparo domain operations.
pub type Result<T> = std::result::Result<T, ReparoError>;
