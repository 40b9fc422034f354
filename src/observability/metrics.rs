use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub geofence_checks_total: IntCounterVec,
    pub verify_attempts_total: IntCounterVec,
    pub open_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let geofence_checks_total = IntCounterVec::new(
            Opts::new(
                "geofence_checks_total",
                "Checkout geofence checks by outcome",
            ),
            &["outcome"],
        )
        .expect("valid geofence_checks_total metric");

        let verify_attempts_total = IntCounterVec::new(
            Opts::new(
                "verify_attempts_total",
                "Delivery code verification attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid verify_attempts_total metric");

        let open_orders = IntGauge::new("open_orders", "Orders not yet delivered or cancelled")
            .expect("valid open_orders metric");

        registry
            .register(Box::new(geofence_checks_total.clone()))
            .expect("register geofence_checks_total");
        registry
            .register(Box::new(verify_attempts_total.clone()))
            .expect("register verify_attempts_total");
        registry
            .register(Box::new(open_orders.clone()))
            .expect("register open_orders");

        Self {
            registry,
            geofence_checks_total,
            verify_attempts_total,
            open_orders,
        }
    }

    pub fn record_geofence(&self, outcome: &str) {
        self.geofence_checks_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_verify(&self, outcome: &str) {
        self.verify_attempts_total
            .with_label_values(&[outcome])
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
