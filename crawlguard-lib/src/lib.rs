#![forbid(unsafe_code)]

pub mod config;
pub mod detection;
pub mod error;
pub mod fingerprinting;
pub mod guard;
pub mod middleware;
pub mod proxy;
pub mod rules;
pub mod security;
pub mod telemetry;

pub use config::{load_from_path, Config, GuardConfig};
pub use detection::{Action, Decision, Reason};
pub use error::{GuardError, Result};
pub use fingerprinting::{Fingerprint, RequestView};
pub use guard::{BlockHandler, Guard, GuardBuilder, RespBody};
pub use middleware::forbidden;
pub use rules::{RuleManager, RuleSet};
pub use security::RateLimiter;
pub use telemetry::TelemetryClient;
