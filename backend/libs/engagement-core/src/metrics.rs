//! Engine metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

use crate::model::{EdgeKind, Metric};

static METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cache_hits: CounterVec,
    cache_misses: CounterVec,
    cache_errors: CounterVec,
    refresh_jobs: CounterVec,
    toggles: CounterVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cache_hits: CounterVec::new(
                Opts::new("engagement_counter_cache_hits_total", "Counter cache hits"),
                &["metric"],
            )
            .expect("valid metric definition"),
            cache_misses: CounterVec::new(
                Opts::new(
                    "engagement_counter_cache_misses_total",
                    "Counter cache misses",
                ),
                &["metric"],
            )
            .expect("valid metric definition"),
            cache_errors: CounterVec::new(
                Opts::new(
                    "engagement_cache_errors_total",
                    "Cache and ranked index operation failures",
                ),
                &["operation"],
            )
            .expect("valid metric definition"),
            refresh_jobs: CounterVec::new(
                Opts::new(
                    "engagement_refresh_jobs_total",
                    "Derived-state refresh jobs by outcome",
                ),
                &["outcome"],
            )
            .expect("valid metric definition"),
            toggles: CounterVec::new(
                Opts::new("engagement_toggles_total", "Edge toggles by outcome"),
                &["kind", "outcome"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.cache_hits.clone()))?;
        registry.register(Box::new(self.cache_misses.clone()))?;
        registry.register(Box::new(self.cache_errors.clone()))?;
        registry.register(Box::new(self.refresh_jobs.clone()))?;
        registry.register(Box::new(self.toggles.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static EngineMetricsInner {
    METRICS.get_or_init(EngineMetricsInner::new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed,
    Failed,
    Dropped,
}

impl RefreshOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Completed => "completed",
            RefreshOutcome::Failed => "failed",
            RefreshOutcome::Dropped => "dropped",
        }
    }
}

/// Engine metrics wrapper
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMetrics;

impl EngineMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register all engine metrics with a registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self, metric: Metric) {
        get_metrics()
            .cache_hits
            .with_label_values(&[metric.name()])
            .inc();
    }

    pub fn record_miss(&self, metric: Metric) {
        get_metrics()
            .cache_misses
            .with_label_values(&[metric.name()])
            .inc();
    }

    pub fn record_cache_error(&self, operation: &str) {
        get_metrics()
            .cache_errors
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_refresh(&self, outcome: RefreshOutcome) {
        get_metrics()
            .refresh_jobs
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_toggle(&self, kind: EdgeKind, outcome: &str) {
        get_metrics()
            .toggles
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }
}
