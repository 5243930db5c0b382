use http::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::{GuardError, Result};
use crate::fingerprinting::Fingerprint;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// Body of `POST /v1/fingerprints`.
#[derive(Serialize)]
struct Batch<'a> {
    events: &'a [Fingerprint],
}

/// Best-effort fingerprint reporter.
///
/// Fingerprints are buffered in memory and posted in batches, either on a
/// timer or as soon as the buffer reaches its cap. A failed batch is dropped.
pub struct TelemetryClient {
    enabled: bool,
    buffer: Mutex<Vec<Fingerprint>>,
    max_buffer: usize,
    client: Client,
    url: String,
    api_key: String,
    tracker: TaskTracker,
    metrics: Option<Arc<Metrics>>,
}

impl TelemetryClient {
    pub fn new(
        enabled: bool,
        max_buffer: usize,
        client: Client,
        url: String,
        api_key: String,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            enabled,
            buffer: Mutex::new(Vec::with_capacity(if enabled { max_buffer } else { 0 })),
            max_buffer,
            client,
            url,
            api_key,
            tracker: TaskTracker::new(),
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of fingerprints waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Buffer one fingerprint. Never blocks on I/O.
    ///
    /// When the buffer reaches its cap a flush is started on a detached task.
    pub fn push(self: &Arc<Self>, fingerprint: Fingerprint) {
        if !self.enabled {
            if let Some(m) = &self.metrics {
                m.record_telemetry_event(values::EVENT_DISABLED);
            }
            return;
        }

        let full = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.push(fingerprint);
            buffer.len() >= self.max_buffer
        };
        if let Some(m) = &self.metrics {
            m.record_telemetry_event(values::EVENT_BUFFERED);
        }

        if full {
            // Outside a runtime the batch waits for the next timer or final flush.
            if Handle::try_current().is_ok() {
                let this = Arc::clone(self);
                self.tracker.spawn(async move { this.flush().await });
            } else {
                debug!("Telemetry buffer full outside a runtime, deferring flush");
            }
        }
    }

    /// Send everything buffered so far as one batch.
    ///
    /// The buffer is swapped out under the lock, so pushes racing with a
    /// flush land in the next batch. Failures are logged and the batch is lost.
    pub async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if buffer.is_empty() {
                return;
            }
            mem::replace(&mut *buffer, Vec::with_capacity(self.max_buffer))
        };

        let count = batch.len() as u64;
        let result = match self.send(&batch).await {
            Ok(()) => {
                debug!(events = count, "Telemetry batch sent");
                values::BATCH_SENT
            }
            Err(e) => {
                warn!(events = count, error = %e, "Telemetry batch dropped");
                values::BATCH_FAILED
            }
        };
        if let Some(m) = &self.metrics {
            m.record_telemetry_batch(result, count);
        }
    }

    async fn send(&self, events: &[Fingerprint]) -> Result<()> {
        let body = serde_json::to_vec(&Batch { events })?;
        self.client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(GuardError::TelemetrySend)?;
        Ok(())
    }

    /// Periodic flush until `cancel` fires. The final flush is left to the
    /// owner so it happens after every producer has stopped.
    pub async fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Telemetry flush received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => self.flush().await,
            }
        }
    }

    /// Wait for size-triggered flushes that are still in flight.
    pub async fn wait_detached(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
