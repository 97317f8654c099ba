use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub operations_total: IntCounterVec,
    pub operation_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub active_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_operations_total",
                "Lifecycle operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid lifecycle_operations_total metric");

        let operation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "lifecycle_operation_latency_seconds",
                "Latency of lifecycle operations in seconds, store round-trips included",
            ),
            &["operation", "outcome"],
        )
        .expect("valid lifecycle_operation_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order status transitions"),
            &["from", "to"],
        )
        .expect("valid order_transitions_total metric");

        let active_sessions = IntGauge::new("active_sessions", "Currently registered sessions")
            .expect("valid active_sessions metric");

        registry
            .register(Box::new(operations_total.clone()))
            .expect("register lifecycle_operations_total");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("register lifecycle_operation_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(active_sessions.clone()))
            .expect("register active_sessions");

        Self {
            registry,
            operations_total,
            operation_latency_seconds,
            transitions_total,
            active_sessions,
        }
    }

    pub fn observe_operation(&self, operation: &str, outcome: &str, elapsed_secs: f64) {
        self.operation_latency_seconds
            .with_label_values(&[operation, outcome])
            .observe(elapsed_secs);
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
