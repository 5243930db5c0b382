use serde::Deserialize;

/// Timeout configuration for the forwarding server
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Backend connect timeout in milliseconds
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// Upper bound on waiting for in-flight connections after a signal
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_ms: default_connect_timeout(), shutdown_secs: default_shutdown_timeout() }
    }
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    30
}
