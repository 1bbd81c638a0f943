//! Prometheus metrics for chain queries.
//!
//! [`QueryMetrics`] owns its [`Registry`]. Construct it once, wrap it in
//! `Arc` and hand it to the [`QueryContext`](crate::query::QueryContext);
//! every query built from that context records into it.

use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry};

pub struct QueryMetrics {
    /// Network requests issued (success + failure).
    pub fetches_total: Counter,
    /// Requests that ended in a network or decode error.
    pub fetch_errors_total: Counter,
    /// `fetch()` calls that joined an outstanding request.
    pub coalesced_total: Counter,
    /// Responses dropped because a newer request had been issued.
    pub discarded_total: Counter,
    /// Persistent store reads/writes that failed.
    pub store_errors_total: Counter,
    /// Request latency in seconds.
    pub fetch_duration: Histogram,
    pub registry: Registry,
}

impl QueryMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let fetches_total = Counter::with_opts(Opts::new(
            "chain_query_fetches_total",
            "Total REST requests issued by chain queries",
        ))?;

        let fetch_errors_total = Counter::with_opts(Opts::new(
            "chain_query_fetch_errors_total",
            "REST requests that failed with a network or decode error",
        ))?;

        let coalesced_total = Counter::with_opts(Opts::new(
            "chain_query_coalesced_total",
            "Fetch calls served by an already outstanding request",
        ))?;

        let discarded_total = Counter::with_opts(Opts::new(
            "chain_query_discarded_total",
            "Out-of-order responses discarded",
        ))?;

        let store_errors_total = Counter::with_opts(Opts::new(
            "chain_query_store_errors_total",
            "Failed persistent store operations",
        ))?;

        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "chain_query_fetch_duration_seconds",
                "REST request latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        registry.register(Box::new(fetches_total.clone()))?;
        registry.register(Box::new(fetch_errors_total.clone()))?;
        registry.register(Box::new(coalesced_total.clone()))?;
        registry.register(Box::new(discarded_total.clone()))?;
        registry.register(Box::new(store_errors_total.clone()))?;
        registry.register(Box::new(fetch_duration.clone()))?;

        Ok(Self {
            fetches_total,
            fetch_errors_total,
            coalesced_total,
            discarded_total,
            store_errors_total,
            fetch_duration,
            registry,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
