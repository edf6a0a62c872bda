//! OpenTelemetry metrics.
//!
//! Key metrics:
//! - tidings_notifications_sent_total: Counter for recorded notifications
//! - tidings_deliveries_total: Counter for notifications enqueued to a subscriber
//! - tidings_deliveries_dropped_total: Counter for notifications lost to a full queue
//! - tidings_persistence_failures_total: Counter for failed repository calls
//! - tidings_active_subscriptions: Live subscription count

use opentelemetry::metrics::{Counter, Meter, UpDownCounter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Tidings metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of notifications recorded by the store.
    pub notifications_sent: Counter<u64>,
    /// Total number of successful enqueues into subscriber queues.
    pub deliveries: Counter<u64>,
    /// Total number of enqueues skipped because the queue was full.
    pub deliveries_dropped: Counter<u64>,
    /// Total number of repository operations that failed.
    pub persistence_failures: Counter<u64>,
    /// Currently registered subscriptions.
    pub active_subscriptions: UpDownCounter<i64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            notifications_sent: meter
                .u64_counter("tidings_notifications_sent_total")
                .with_description("Total number of notifications recorded")
                .with_unit("1")
                .init(),
            deliveries: meter
                .u64_counter("tidings_deliveries_total")
                .with_description("Notifications enqueued to a live subscriber")
                .with_unit("1")
                .init(),
            deliveries_dropped: meter
                .u64_counter("tidings_deliveries_dropped_total")
                .with_description("Notifications dropped because a subscriber queue was full")
                .with_unit("1")
                .init(),
            persistence_failures: meter
                .u64_counter("tidings_persistence_failures_total")
                .with_description("Repository operations that failed")
                .with_unit("1")
                .init(),
            active_subscriptions: meter
                .i64_up_down_counter("tidings_active_subscriptions")
                .with_description("Currently registered live subscriptions")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    install_manual_reader();
                }
            }
        } else {
            // Metrics are recorded but not exported
            install_manual_reader();
        }

        let meter = global::meter("tidings");
        Metrics::new(&meter)
    });
}

fn install_manual_reader() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Record a notification accepted by the store.
pub fn record_sent(backend: &'static str) {
    if let Some(m) = METRICS.get() {
        m.notifications_sent
            .add(1, &[KeyValue::new("backend", backend)]);
    }
}

/// Record the outcome of one fanout pass.
pub fn record_fanout(delivered: usize, dropped: usize) {
    if let Some(m) = METRICS.get() {
        if delivered > 0 {
            m.deliveries.add(delivered as u64, &[]);
        }
        if dropped > 0 {
            m.deliveries_dropped.add(dropped as u64, &[]);
        }
    }
}

/// Record a failed repository operation.
pub fn record_persistence_failure(backend: &'static str, operation: &'static str) {
    if let Some(m) = METRICS.get() {
        let attrs = [
            KeyValue::new("backend", backend),
            KeyValue::new("operation", operation),
        ];
        m.persistence_failures.add(1, &attrs);
    }
}

/// Record subscriptions being registered (`+1`) or removed (`-1`).
pub fn record_subscription_change(delta: i64) {
    if let Some(m) = METRICS.get() {
        m.active_subscriptions.add(delta, &[]);
    }
}
