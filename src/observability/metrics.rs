use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_cycles_total: IntCounterVec,
    pub offers_total: IntCounterVec,
    pub requests_resolved_total: IntCounterVec,
    pub dispatch_cycle_duration_seconds: HistogramVec,
    pub connected_clients: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_cycles_total = IntCounterVec::new(
            Opts::new("dispatch_cycles_total", "Dispatch cycles by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_cycles_total metric");

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Offer push attempts by outcome"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let requests_resolved_total = IntCounterVec::new(
            Opts::new(
                "requests_resolved_total",
                "Dispatch requests resolved by terminal status",
            ),
            &["status"],
        )
        .expect("valid requests_resolved_total metric");

        let dispatch_cycle_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_cycle_duration_seconds",
                "Duration of one matching cycle in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_cycle_duration_seconds metric");

        let connected_clients = IntGaugeVec::new(
            Opts::new("connected_clients", "Live channels per actor role"),
            &["role"],
        )
        .expect("valid connected_clients metric");

        registry
            .register(Box::new(dispatch_cycles_total.clone()))
            .expect("register dispatch_cycles_total");
        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(requests_resolved_total.clone()))
            .expect("register requests_resolved_total");
        registry
            .register(Box::new(dispatch_cycle_duration_seconds.clone()))
            .expect("register dispatch_cycle_duration_seconds");
        registry
            .register(Box::new(connected_clients.clone()))
            .expect("register connected_clients");

        Self {
            registry,
            dispatch_cycles_total,
            offers_total,
            requests_resolved_total,
            dispatch_cycle_duration_seconds,
            connected_clients,
        }
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
