use serde::Deserialize;
use std::time::Duration;

use crate::error::{GuardError, Result};

/// Detection guard configuration
///
/// Every field is optional in TOML; missing fields take the defaults below.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GuardConfig {
    /// Base URL of the rule distribution and fingerprint ingest service
    /// Rules are fetched from `{api_url}/v1/rules`, fingerprints are posted
    /// to `{api_url}/v1/fingerprints`
    /// Default: "https://bbloker.com"
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token sent with every outbound call
    /// Default: empty (the remote service will reject requests)
    #[serde(default)]
    pub api_key: String,
    /// Rule refresh interval in seconds
    /// Default: 300 (5 minutes)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    /// Telemetry flush interval in seconds
    /// Default: 10
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Number of buffered fingerprints that forces an early flush
    /// Default: 100
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Enable fingerprint reporting
    /// When disabled no flush task is started and `push` is a no-op
    /// Default: true
    #[serde(default = "default_true")]
    pub telemetry: bool,
    /// Maximum requests allowed per client IP in one window
    /// Default: 60
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Fixed window length in seconds
    /// Default: 60
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
    /// Timeout for each outbound rule fetch or telemetry post, in seconds
    /// Default: 10
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            sync_interval_secs: default_sync_interval(),
            flush_interval_secs: default_flush_interval(),
            buffer_size: default_buffer_size(),
            telemetry: default_true(),
            rate_limit: default_rate_limit(),
            rate_limit_window_secs: default_rate_limit_window(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GuardConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint the rule manager polls.
    pub fn rules_url(&self) -> String {
        format!("{}/v1/rules", self.api_url.trim_end_matches('/'))
    }

    /// Endpoint the telemetry client posts batches to.
    pub fn fingerprints_url(&self) -> String {
        format!("{}/v1/fingerprints", self.api_url.trim_end_matches('/'))
    }

    /// Semantic checks that serde cannot express.
    ///
    /// Zero periods are rejected because a periodic task cannot tick at a
    /// zero interval. An empty API key is allowed but logged.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(GuardError::Config(format!(
                "api_url must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        if self.sync_interval_secs == 0 {
            return Err(GuardError::Config("sync_interval_secs must be > 0".into()));
        }
        if self.flush_interval_secs == 0 {
            return Err(GuardError::Config("flush_interval_secs must be > 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(GuardError::Config("buffer_size must be > 0".into()));
        }
        if self.rate_limit == 0 {
            return Err(GuardError::Config("rate_limit must be > 0".into()));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(GuardError::Config("rate_limit_window_secs must be > 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(GuardError::Config("request_timeout_secs must be > 0".into()));
        }
        if self.api_key.trim().is_empty() {
            tracing::warn!("guard api_key is empty; rule sync and telemetry will be rejected");
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://bbloker.com".to_string()
}

fn default_sync_interval() -> u64 {
    300
}

fn default_flush_interval() -> u64 {
    10
}

fn default_buffer_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> u32 {
    60
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}
