//! Metrics collection using Prometheus
//!
//! Counters and gauges for reconciliation passes and lobby creations.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the lobby keeper
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    /// Reconciliation passes by outcome
    pub reconcile_passes_total: IntCounterVec,

    /// Lobby creations by outcome
    pub creations_total: IntCounterVec,

    /// Creations awaiting confirmation
    pub pending_creations: IntGauge,

    /// Brackets missing at the start of the last completed read
    pub missing_brackets: IntGauge,

    /// Time from create command to settled outcome
    pub creation_duration: Histogram,

    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let reconcile_passes_total = IntCounterVec::new(
            Opts::new(
                "lobby_keeper_reconcile_passes_total",
                "Reconciliation passes by outcome",
            ),
            &["outcome"],
        )?;
        let creations_total = IntCounterVec::new(
            Opts::new("lobby_keeper_creations_total", "Lobby creations by outcome"),
            &["outcome"],
        )?;
        let pending_creations = IntGauge::new(
            "lobby_keeper_pending_creations",
            "Lobby creations awaiting confirmation",
        )?;
        let missing_brackets = IntGauge::new(
            "lobby_keeper_missing_brackets",
            "Brackets without an owned lobby at the last registry read",
        )?;
        let creation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lobby_keeper_creation_duration_seconds",
                "Time from create command to settled outcome",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
        )?;
        let uptime_seconds =
            IntGauge::new("lobby_keeper_uptime_seconds", "Service uptime in seconds")?;

        registry.register(Box::new(reconcile_passes_total.clone()))?;
        registry.register(Box::new(creations_total.clone()))?;
        registry.register(Box::new(pending_creations.clone()))?;
        registry.register(Box::new(missing_brackets.clone()))?;
        registry.register(Box::new(creation_duration.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry,
            reconcile_passes_total,
            creations_total,
            pending_creations,
            missing_brackets,
            creation_duration,
            uptime_seconds,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_pass(&self, outcome: &str) {
        self.reconcile_passes_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_creation(&self, outcome: &str, duration: Duration) {
        self.creations_total.with_label_values(&[outcome]).inc();
        self.creation_duration.observe(duration.as_secs_f64());
    }

    /// Render every metric in Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_pass("completed");
        collector.record_pass("skipped");
        collector.record_creation("created", Duration::from_millis(300));
        collector.record_creation("timeout", Duration::from_secs(10));
        collector.missing_brackets.set(2);

        assert_eq!(
            collector
                .reconcile_passes_total
                .with_label_values(&["completed"])
                .get(),
            1
        );
        assert_eq!(collector.creation_duration.get_sample_count(), 2);

        let text = collector.encode_text().unwrap();
        assert!(text.contains("lobby_keeper_creations_total{outcome=\"timeout\"} 1"));
        assert!(text.contains("lobby_keeper_missing_brackets 2"));
    }

    #[test]
    fn test_collectors_are_independent() {
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();
        first.record_pass("completed");

        assert_eq!(
            second
                .reconcile_passes_total
                .with_label_values(&["completed"])
                .get(),
            0
        );
    }
}
