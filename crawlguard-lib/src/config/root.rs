use serde::Deserialize;
use std::net::SocketAddr;

use super::guard::GuardConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Main configuration structure for the `crawlguard` binary
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:7000" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Upstream application that receives allowed requests (host:port)
    /// Example: "127.0.0.1:3000"
    pub backend: String,
    /// Preserve the original Host header when forwarding
    /// Default: false
    #[serde(default)]
    pub preserve_host: bool,
    /// Detection pipeline configuration
    #[serde(default)]
    pub guard: GuardConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Metrics configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
