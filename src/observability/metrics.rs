use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub trip_transitions_total: IntCounterVec,
    pub notifications_pending: IntGauge,
    pub dispatch_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment attempts by path and outcome"),
            &["path", "outcome"],
        )
        .expect("valid assignments_total metric");

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Committed trip state transitions"),
            &["event"],
        )
        .expect("valid trip_transitions_total metric");

        let notifications_pending = IntGauge::new(
            "notifications_pending",
            "Notification intents waiting for delivery",
        )
        .expect("valid notifications_pending metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of dispatch operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid dispatch_latency_seconds metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");
        registry
            .register(Box::new(notifications_pending.clone()))
            .expect("register notifications_pending");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");

        Self {
            registry,
            assignments_total,
            trip_transitions_total,
            notifications_pending,
            dispatch_latency_seconds,
        }
    }

    pub fn record_assignment(&self, path: &str, outcome: &str) {
        self.assignments_total
            .with_label_values(&[path, outcome])
            .inc();
    }

    pub fn record_transition(&self, event: &str) {
        self.trip_transitions_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn observe_latency(&self, operation: &str, seconds: f64) {
        self.dispatch_latency_seconds
            .with_label_values(&[operation])
            .observe(seconds);
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
