use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order ingestion (publish throughput and failures)
// - Pipeline persistence (consume/persist throughput, latency, duplicates)
// - Read path cache effectiveness (hits/misses)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub orders_published: IntCounter,
    pub publish_failures: IntCounter,

    // Pipeline Metrics
    pub orders_consumed: IntCounter,
    pub orders_persisted: IntCounter,
    pub persist_failures: IntCounterVec,
    pub duplicate_orders: IntCounter,
    pub persist_duration: Histogram,

    // Read Path Metrics
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Ingestion Metrics
        let orders_published = IntCounter::new(
            "orders_published_total",
            "Total orders accepted over HTTP and published to the broker",
        )?;
        registry.register(Box::new(orders_published.clone()))?;

        let publish_failures = IntCounter::new(
            "publish_failures_total",
            "Total publish attempts that did not receive a broker acknowledgment",
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        // Pipeline Metrics
        let orders_consumed = IntCounter::new(
            "orders_consumed_total",
            "Total messages received from the broker",
        )?;
        registry.register(Box::new(orders_consumed.clone()))?;

        let orders_persisted = IntCounter::new(
            "orders_persisted_total",
            "Total orders written to storage",
        )?;
        registry.register(Box::new(orders_persisted.clone()))?;

        let persist_failures = IntCounterVec::new(
            Opts::new(
                "persist_failures_total",
                "Total messages that could not be persisted",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(persist_failures.clone()))?;

        let duplicate_orders = IntCounter::new(
            "duplicate_orders_total",
            "Total redelivered orders already present in storage",
        )?;
        registry.register(Box::new(duplicate_orders.clone()))?;

        let persist_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_persist_duration_seconds",
                "Order persistence duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(persist_duration.clone()))?;

        // Read Path Metrics
        let cache_hits = IntCounter::new(
            "cache_hits_total",
            "Total order lookups answered from the in-process cache",
        )?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = IntCounter::new(
            "cache_misses_total",
            "Total order lookups that fell through to storage",
        )?;
        registry.register(Box::new(cache_misses.clone()))?;

        Ok(Self {
            registry,
            orders_published,
            publish_failures,
            orders_consumed,
            orders_persisted,
            persist_failures,
            duplicate_orders,
            persist_duration,
            cache_hits,
            cache_misses,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a successfully persisted order
    pub fn record_persist(&self, duration_secs: f64) {
        self.orders_persisted.inc();
        self.persist_duration.observe(duration_secs);
    }

    /// Helper to record a message the pipeline could not persist
    pub fn record_persist_failure(&self, reason: &str) {
        self.persist_failures.with_label_values(&[reason]).inc();
    }

    /// Helper to record a read-path cache lookup
    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_persist() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persist(0.05);
        metrics.record_persist(0.2);

        assert_eq!(metrics.orders_persisted.get(), 2);
        assert_eq!(metrics.persist_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_record_persist_failure_by_reason() {
        let metrics = Metrics::new().unwrap();
        metrics.record_persist_failure("decode");
        metrics.record_persist_failure("storage");
        metrics.record_persist_failure("storage");

        let gathered = metrics.registry.gather();
        let failures = gathered
            .iter()
            .find(|m| m.name() == "persist_failures_total")
            .unwrap();
        assert_eq!(failures.metric.len(), 2); // Two different reason labels
    }

    #[test]
    fn test_record_cache_lookup() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        metrics.record_cache_lookup(false);

        assert_eq!(metrics.cache_hits.get(), 1);
        assert_eq!(metrics.cache_misses.get(), 2);
    }
}
