use thiserror::Error;

/// Errors that can occur in the guard
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rule fetch returned status {0}")]
    RuleStatus(u16),

    #[error("Rule fetch failed: {0}")]
    RuleFetch(#[source] reqwest::Error),

    #[error("Malformed rule set: {0}")]
    RuleDecode(String),

    #[error("Telemetry serialization failed: {0}")]
    TelemetryEncode(#[from] serde_json::Error),

    #[error("Telemetry send failed: {0}")]
    TelemetrySend(#[source] reqwest::Error),

    #[error("Guard must be started inside a Tokio runtime")]
    NoRuntime,

    #[error("Invalid header pattern for '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, GuardError>;
