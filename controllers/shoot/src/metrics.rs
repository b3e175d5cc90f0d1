//! Prometheus metrics for the shoot controller.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `shootops_reconciliations_total` | Counter | `result` |
//! | `shootops_generation_bumps_total` | Counter | `reason` |
//! | `shootops_legacy_backup_migrations_total` | Counter | |
//! | `shootops_reconcile_duration_seconds` | Histogram | `result` |

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

const RECONCILE_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0];

/// Metrics recorded by the reconciler.
///
/// All metrics use interior mutability; the struct is cheap to clone.
#[derive(Clone)]
pub struct ShootMetrics {
    registry: Registry,
    reconciliations_total: CounterVec,
    generation_bumps_total: CounterVec,
    legacy_migrations_total: IntCounter,
    reconcile_duration: HistogramVec,
}

impl std::fmt::Debug for ShootMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShootMetrics").finish_non_exhaustive()
    }
}

impl ShootMetrics {
    /// Create the metrics and register them with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations_total = CounterVec::new(
            Opts::new("shootops_reconciliations_total", "Reconciliation passes by result"),
            &["result"],
        )?;
        registry.register(Box::new(reconciliations_total.clone()))?;

        let generation_bumps_total = CounterVec::new(
            Opts::new(
                "shootops_generation_bumps_total",
                "Scheduled reconciliations by generation policy reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(generation_bumps_total.clone()))?;

        let legacy_migrations_total = IntCounter::new(
            "shootops_legacy_backup_migrations_total",
            "Legacy backup infrastructure records retired after migration",
        )?;
        registry.register(Box::new(legacy_migrations_total.clone()))?;

        let reconcile_duration = HistogramVec::new(
            HistogramOpts::new(
                "shootops_reconcile_duration_seconds",
                "Duration of reconciliation passes",
            )
            .buckets(RECONCILE_BUCKETS.to_vec()),
            &["result"],
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            generation_bumps_total,
            legacy_migrations_total,
            reconcile_duration,
        })
    }

    /// Record a finished pass
    pub fn reconciled(&self, result: &str, seconds: f64) {
        self.reconciliations_total.with_label_values(&[result]).inc();
        self.reconcile_duration
            .with_label_values(&[result])
            .observe(seconds);
    }

    /// Record a generation bump
    pub fn generation_bumped(&self, reason: &str) {
        self.generation_bumps_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a completed legacy backup migration
    pub fn legacy_migration_completed(&self) {
        self.legacy_migrations_total.inc();
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
