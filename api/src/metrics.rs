use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RECORDS_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "telemetry_records_created_total",
        "Total telemetry records created via the API"
    ))
    .unwrap();
    pub static ref VALIDATION_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "telemetry_validation_failures_total",
        "Total requests rejected by record validation"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "telemetry_store_failures_total",
        "Total failed round trips to the remote store"
    ))
    .unwrap();
    pub static ref STORE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "telemetry_store_latency_seconds",
            "Remote store round-trip latency"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(RECORDS_CREATED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(VALIDATION_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(STORE_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
