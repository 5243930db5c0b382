use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GuardError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GuardError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| GuardError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.backend.trim().is_empty() {
        return Err(GuardError::Config("backend address cannot be empty".into()));
    }
    if cfg.backend.contains("://") {
        return Err(GuardError::Config(format!(
            "backend must be host:port without a scheme, got '{}'",
            cfg.backend
        )));
    }
    if cfg.timeout.connect_ms == 0 {
        return Err(GuardError::Config("connect_ms must be > 0".into()));
    }

    cfg.guard.validate()
}
