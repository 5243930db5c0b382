#![forbid(unsafe_code)]

use clap::Parser;
use crawlguard_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use crawlguard_lib::{config::load_from_path, proxy, Config, GuardBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Crawler and AI scraper blocking proxy")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/crawlguard.toml")]
    config: PathBuf,

    /// API key for the rule and ingest service, overrides `guard.api_key`
    #[arg(long, env = "CRAWLGUARD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Some(key) = cli.api_key {
        cfg.guard.api_key = key;
    }

    if let Err(err) = init_tracing(
        &cfg.logging.level,
        cfg.logging.show_target,
        &cfg.telemetry.otel_log_level,
    ) {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cfg).await {
        error!(%err, "crawlguard exited with error");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(listen = ?cfg.listen, backend = %cfg.backend, "configuration loaded");

    let shutdown = CancellationToken::new();
    let mut builder = GuardBuilder::new(cfg.guard.clone());

    let registry = match cfg.telemetry.metrics_port {
        Some(_) => {
            let (metrics, registry) = init_metrics()?;
            builder = builder.metrics(metrics);
            Some(registry)
        }
        None => None,
    };

    let guard = Arc::new(builder.start()?);

    if let (Some(port), Some(registry)) = (cfg.telemetry.metrics_port, registry) {
        let guard = Arc::clone(&guard);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = start_observability_server(port, registry, guard, shutdown).await {
                warn!(%err, "observability server exited with error");
            }
        });
    }

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let result = proxy::run(Arc::new(cfg), Arc::clone(&guard), shutdown.clone()).await;
    // The proxy may also stop on a bind error; make sure everything else stops.
    shutdown.cancel();
    guard.close().await;

    result.map_err(Into::into)
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to setup SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to setup SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
