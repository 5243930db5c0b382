mod guard;
mod loader;
mod root;
mod telemetry;
mod timeout;

pub use guard::GuardConfig;
pub use loader::load_from_path;
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
