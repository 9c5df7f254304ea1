//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_transactions_total` - Total committed transactions
//! - `ledger_imbalance_rejections_total` - Unbalanced postings rejected
//! - `ledger_accounts_created_total` - Accounts created
//! - `ledger_post_duration_seconds` - Histogram of post latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Uses a per-instance registry so multiple engines (tests, embedded
/// usage) never collide on metric names.
#[derive(Clone)]
pub struct Metrics {
    /// Total committed transactions
    pub transactions_total: IntCounter,

    /// Unbalanced postings rejected before any write
    pub imbalance_rejections_total: IntCounter,

    /// Accounts created
    pub accounts_created_total: IntCounter,

    /// Post latency histogram
    pub post_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounter::new(
            "ledger_transactions_total",
            "Total committed transactions",
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let imbalance_rejections_total = IntCounter::new(
            "ledger_imbalance_rejections_total",
            "Unbalanced postings rejected",
        )?;
        registry.register(Box::new(imbalance_rejections_total.clone()))?;

        let accounts_created_total = IntCounter::new(
            "ledger_accounts_created_total",
            "Accounts created",
        )?;
        registry.register(Box::new(accounts_created_total.clone()))?;

        let post_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_post_duration_seconds",
                "Histogram of post latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(post_duration.clone()))?;

        Ok(Self {
            transactions_total,
            imbalance_rejections_total,
            accounts_created_total,
            post_duration,
            registry,
        })
    }

    /// Record a committed transaction
    pub fn record_transaction(&self) {
        self.transactions_total.inc();
    }

    /// Record an imbalance rejection
    pub fn record_imbalance_rejection(&self) {
        self.imbalance_rejections_total.inc();
    }

    /// Record an account creation
    pub fn record_account_created(&self) {
        self.accounts_created_total.inc();
    }

    /// Record post duration
    pub fn record_post_duration(&self, duration_seconds: f64) {
        self.post_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_total", &self.transactions_total.get())
            .field(
                "imbalance_rejections_total",
                &self.imbalance_rejections_total.get(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transactions_total.get(), 0);
        assert_eq!(metrics.imbalance_rejections_total.get(), 0);
    }

    #[test]
    fn test_record_transaction() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transaction();
        metrics.record_transaction();
        assert_eq!(metrics.transactions_total.get(), 2);
    }

    #[test]
    fn test_independent_registries() {
        // Two engines in one process must not collide
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_imbalance_rejection();
        assert_eq!(a.imbalance_rejections_total.get(), 1);
        assert_eq!(b.imbalance_rejections_total.get(), 0);
    }
}
