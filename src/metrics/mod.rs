use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry,
};
use lazy_static::lazy_static;
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,

    // Gauge metrics
    pub snapshot_processes: IntGauge,
    pub history_series: IntGauge,
    pub watchlist_names: IntGauge,
    pub respawn_subscriptions: IntGauge,

    // Counter metrics
    pub polls_total: IntCounterVec,
    pub watchlist_kills_total: IntCounter,
    pub batch_targets_total: IntCounterVec,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let snapshot_processes = register_int_gauge_with_registry!(
            Opts::new("supervisor_snapshot_processes", "Processes in the latest snapshot"),
            registry
        )?;

        let history_series = register_int_gauge_with_registry!(
            Opts::new("supervisor_history_series", "Process series held by the history store"),
            registry
        )?;

        let watchlist_names = register_int_gauge_with_registry!(
            Opts::new("supervisor_watchlist_names", "Names on the kill watchlist"),
            registry
        )?;

        let respawn_subscriptions = register_int_gauge_with_registry!(
            Opts::new("supervisor_respawn_subscriptions", "Active auto-respawn subscriptions"),
            registry
        )?;

        let polls_total = register_int_counter_vec_with_registry!(
            Opts::new("supervisor_polls_total", "Snapshot poll ticks by outcome"),
            &["outcome"],
            registry
        )?;

        let watchlist_kills_total = register_int_counter_with_registry!(
            Opts::new("supervisor_watchlist_kills_total", "Kill commands issued by the watchlist"),
            registry
        )?;

        let batch_targets_total = register_int_counter_vec_with_registry!(
            Opts::new("supervisor_batch_targets_total", "Batch targets by action and outcome"),
            &["action", "outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            snapshot_processes,
            history_series,
            watchlist_names,
            respawn_subscriptions,
            polls_total,
            watchlist_kills_total,
            batch_targets_total,
        })
    }

    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_poll(&self, outcome: &str) {
        self.polls_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_batch(&self, action: &str, succeeded: usize, failed: usize, skipped: usize) {
        for (outcome, count) in [("succeeded", succeeded), ("failed", failed), ("skipped", skipped)] {
            if count > 0 {
                self.batch_targets_total
                    .with_label_values(&[action, outcome])
                    .inc_by(count as u64);
            }
        }
    }
}

lazy_static! {
    pub static ref METRICS: Arc<MetricsRegistry> =
        Arc::new(MetricsRegistry::new().unwrap_or_else(|e| panic!("metrics registration failed: {}", e)));
}
