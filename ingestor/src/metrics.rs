use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

use crate::errors::Result;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref INGEST_TICKS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "slms_ingest_ticks_total",
        "Total ingestion ticks started"
    ))
    .expect("metric can be created");
    pub static ref SKIPPED_TICKS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "slms_skipped_ticks_total",
        "Ingestion ticks that stored nothing because of an error"
    ))
    .expect("metric can be created");
    pub static ref UPSTREAM_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "slms_upstream_failures_total",
        "Failed fetches from the telemetry endpoint"
    ))
    .expect("metric can be created");
    pub static ref MALFORMED_PAYLOADS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "slms_malformed_payloads_total",
        "Upstream payloads with an unexpected shape"
    ))
    .expect("metric can be created");
    pub static ref READINGS_STORED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "slms_readings_stored_total",
        "Total readings appended to the store"
    ))
    .expect("metric can be created");
    pub static ref STORE_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "slms_store_failures_total",
        "Total failed store operations"
    ))
    .expect("metric can be created");
    pub static ref INGEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "slms_ingest_latency_seconds",
            "Time taken by one fetch-normalize-store tick"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    )
    .expect("metric can be created");
    pub static ref LAST_BATCH_SIZE: Gauge = Gauge::with_opts(Opts::new(
        "slms_last_batch_size",
        "Readings stored by the most recent successful tick"
    ))
    .expect("metric can be created");
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(INGEST_TICKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SKIPPED_TICKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_PAYLOADS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINGS_STORED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INGEST_LATENCY_SECONDS.clone()))?;
    REGISTRY.register(Box::new(LAST_BATCH_SIZE.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_are_exposed() {
        let registry = Registry::new();
        registry
            .register(Box::new(READINGS_STORED_TOTAL.clone()))
            .unwrap();
        READINGS_STORED_TOTAL.inc_by(3.0);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("slms_readings_stored_total"));
    }
}
