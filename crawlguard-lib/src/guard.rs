use bytes::Bytes;
use http::request::Parts;
use http::Response;
use http_body_util::combinators::BoxBody;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::GuardConfig;
use crate::detection::{Decision, Detector};
use crate::error::{GuardError, Result};
use crate::fingerprinting::RequestView;
use crate::rules::{RuleManager, RuleSource};
use crate::security::rate_limit::{RateLimiter, CLEANUP_INTERVAL};
use crate::telemetry::{Metrics, TelemetryClient};

pub type RespBody = BoxBody<Bytes, hyper::Error>;

/// Produces the response for a blocked request in place of the default 403.
pub type BlockHandler = Arc<dyn Fn(&Parts, &Decision) -> Response<RespBody> + Send + Sync>;

/// Configures and starts a [`Guard`].
pub struct GuardBuilder {
    config: GuardConfig,
    metrics: Option<Arc<Metrics>>,
    block_handler: Option<BlockHandler>,
}

impl GuardBuilder {
    pub fn new(config: GuardConfig) -> Self {
        Self { config, metrics: None, block_handler: None }
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn block_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Parts, &Decision) -> Response<RespBody> + Send + Sync + 'static,
    {
        self.block_handler = Some(Arc::new(handler));
        self
    }

    /// Validate the config, build the components and spawn their background
    /// loops. The built-in rules are active as soon as this returns.
    pub fn start(self) -> Result<Guard> {
        let config = self.config;
        config.validate()?;
        if Handle::try_current().is_err() {
            return Err(GuardError::NoRuntime);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GuardError::Http(format!("Failed to build HTTP client: {e}")))?;

        let rules = Arc::new(RuleManager::new(self.metrics.clone()));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_limit_window()));
        let telemetry = Arc::new(TelemetryClient::new(
            config.telemetry,
            config.buffer_size,
            http.clone(),
            config.fingerprints_url(),
            config.api_key.clone(),
            self.metrics.clone(),
        ));

        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();

        let source = RuleSource::new(http, config.rules_url(), config.api_key.clone());
        tasks.spawn(Arc::clone(&rules).run(source, config.sync_interval(), cancel.clone()));
        tasks.spawn(Arc::clone(&limiter).run_cleanup(
            CLEANUP_INTERVAL,
            cancel.clone(),
            self.metrics.clone(),
        ));
        if telemetry.is_enabled() {
            tasks.spawn(Arc::clone(&telemetry).run(config.flush_interval(), cancel.clone()));
        }

        info!(
            rules_version = rules.version(),
            telemetry = config.telemetry,
            rate_limit = config.rate_limit,
            window_secs = config.rate_limit_window_secs,
            "Guard started"
        );

        Ok(Guard {
            detector: Detector::new(rules, limiter),
            telemetry,
            block_handler: self.block_handler,
            metrics: self.metrics,
            cancel,
            tasks,
            closed: AtomicBool::new(false),
        })
    }
}

/// A running detection pipeline with its background tasks.
///
/// Share it behind an `Arc` between request handlers. Call [`Guard::close`]
/// before dropping it to stop the background loops and flush telemetry;
/// dropping without `close` still stops the loops but skips the flush.
pub struct Guard {
    detector: Detector,
    telemetry: Arc<TelemetryClient>,
    pub(crate) block_handler: Option<BlockHandler>,
    metrics: Option<Arc<Metrics>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    closed: AtomicBool,
}

impl Guard {
    pub fn builder(config: GuardConfig) -> GuardBuilder {
        GuardBuilder::new(config)
    }

    /// Run the detection pipeline for one request.
    pub fn analyze(&self, req: &RequestView) -> Decision {
        let start = Instant::now();
        let decision = self.detector.analyze(req);

        if decision.is_block() {
            debug!(
                ip = %req.ip,
                reason = %decision.reason,
                confidence = decision.confidence,
                "Request blocked"
            );
        }
        if let Some(m) = &self.metrics {
            m.record_decision(
                decision.action.as_str(),
                decision.reason.as_str(),
                start.elapsed().as_secs_f64(),
            );
        }
        decision
    }

    /// Version of the active rule set.
    pub fn rules_version(&self) -> u64 {
        self.detector.rules().version()
    }

    pub fn rules(&self) -> &Arc<RuleManager> {
        self.detector.rules()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.detector.limiter()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryClient> {
        &self.telemetry
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop every background loop, wait for them, then flush telemetry once.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.telemetry.wait_detached().await;
        self.telemetry.flush().await;

        info!("Guard stopped");
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
