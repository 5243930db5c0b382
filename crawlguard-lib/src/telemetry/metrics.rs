use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const ACTION: &str = "action";
    pub const REASON: &str = "reason";
    pub const RESULT: &str = "result";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const SYNC_UPDATED: &str = "updated";
    pub const SYNC_UNCHANGED: &str = "unchanged";
    pub const SYNC_FAILED: &str = "error";

    pub const BATCH_SENT: &str = "sent";
    pub const BATCH_FAILED: &str = "failed";

    /// Events dropped because telemetry is disabled.
    pub const EVENT_DISABLED: &str = "disabled";
    pub const EVENT_BUFFERED: &str = "buffered";
}

#[derive(Clone)]
pub struct Metrics {
    // Detection
    pub decisions_total: Counter<u64>,
    pub analysis_duration_seconds: Histogram<f64>,

    // Rule refresh
    pub rule_syncs_total: Counter<u64>,
    pub rules_version: Gauge<u64>,

    // Telemetry reporting
    pub telemetry_batches_total: Counter<u64>,
    pub telemetry_events_total: Counter<u64>,

    // Rate limiting
    pub rate_limit_keys: Gauge<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            decisions_total: meter
                .u64_counter("crawlguard_decisions_total")
                .with_description("Total number of detection decisions by action and reason")
                .build(),
            analysis_duration_seconds: meter
                .f64_histogram("crawlguard_analysis_duration_seconds")
                .with_description("Time spent running the detection pipeline in seconds")
                .build(),

            rule_syncs_total: meter
                .u64_counter("crawlguard_rule_syncs_total")
                .with_description("Rule fetch attempts. result=updated|unchanged|error")
                .build(),
            rules_version: meter
                .u64_gauge("crawlguard_rules_version")
                .with_description("Version of the active rule set")
                .build(),

            telemetry_batches_total: meter
                .u64_counter("crawlguard_telemetry_batches_total")
                .with_description("Telemetry batches posted to ingest. result=sent|failed")
                .build(),
            telemetry_events_total: meter
                .u64_counter("crawlguard_telemetry_events_total")
                .with_description("Fingerprint events. result=buffered|sent|failed|disabled")
                .build(),

            rate_limit_keys: meter
                .u64_gauge("crawlguard_rate_limit_keys")
                .with_description("Number of keys tracked by the rate limiter after cleanup")
                .build(),

            build_info: meter
                .u64_gauge("crawlguard_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_decision(&self, action: &str, reason: &str, duration_secs: f64) {
        self.decisions_total.add(
            1,
            &[
                KeyValue::new(labels::ACTION, action.to_string()),
                KeyValue::new(labels::REASON, reason.to_string()),
            ],
        );
        self.analysis_duration_seconds
            .record(duration_secs, &[KeyValue::new(labels::ACTION, action.to_string())]);
    }

    /// `result` is one of [`values::SYNC_UPDATED`], [`values::SYNC_UNCHANGED`]
    /// or [`values::SYNC_FAILED`].
    pub fn record_rule_sync(&self, result: &str) {
        self.rule_syncs_total
            .add(1, &[KeyValue::new(labels::RESULT, result.to_string())]);
    }

    pub fn record_rules_version(&self, version: u64) {
        self.rules_version.record(version, &[]);
    }

    /// Record one flushed batch of `events` fingerprints.
    pub fn record_telemetry_batch(&self, result: &str, events: u64) {
        let attrs = &[KeyValue::new(labels::RESULT, result.to_string())];
        self.telemetry_batches_total.add(1, attrs);
        self.telemetry_events_total.add(events, attrs);
    }

    pub fn record_telemetry_event(&self, result: &str) {
        self.telemetry_events_total
            .add(1, &[KeyValue::new(labels::RESULT, result.to_string())]);
    }

    pub fn record_rate_limit_keys(&self, keys: u64) {
        self.rate_limit_keys.record(keys, &[]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("crawlguard");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
