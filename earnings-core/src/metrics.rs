//! Metrics collection for observability
//!
//! Prometheus counters for the financial events of the ledger.
//!
//! # Metrics
//!
//! - `earnings_submissions_created_total`
//! - `earnings_submissions_advanced_total`
//! - `earnings_submissions_approved_total`
//! - `earnings_submissions_rejected_total`
//! - `earnings_reservation_drift_total` - approvals whose credited amount
//!   differs from the reserved amount
//! - `earnings_withdrawals_requested_total`
//! - `earnings_withdrawals_resolved_total{decision}`

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Submissions created
    pub submissions_created: IntCounter,

    /// Submissions moved to RECEIVED
    pub submissions_advanced: IntCounter,

    /// Submissions approved
    pub submissions_approved: IntCounter,

    /// Submissions rejected
    pub submissions_rejected: IntCounter,

    /// Approvals where credit != reservation
    pub reservation_drift: IntCounter,

    /// Withdrawals requested
    pub withdrawals_requested: IntCounter,

    /// Withdrawals resolved, by decision
    pub withdrawals_resolved: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let submissions_created = counter(
            "earnings_submissions_created_total",
            "Total number of submissions created",
        )?;
        let submissions_advanced = counter(
            "earnings_submissions_advanced_total",
            "Total number of submissions moved to received",
        )?;
        let submissions_approved = counter(
            "earnings_submissions_approved_total",
            "Total number of submissions approved",
        )?;
        let submissions_rejected = counter(
            "earnings_submissions_rejected_total",
            "Total number of submissions rejected",
        )?;
        let reservation_drift = counter(
            "earnings_reservation_drift_total",
            "Approvals whose credited amount differs from the reserved amount",
        )?;
        let withdrawals_requested = counter(
            "earnings_withdrawals_requested_total",
            "Total number of withdrawal requests",
        )?;

        let withdrawals_resolved = IntCounterVec::new(
            Opts::new(
                "earnings_withdrawals_resolved_total",
                "Total number of resolved withdrawals",
            ),
            &["decision"],
        )?;
        registry.register(Box::new(withdrawals_resolved.clone()))?;

        Ok(Self {
            submissions_created,
            submissions_advanced,
            submissions_approved,
            submissions_rejected,
            reservation_drift,
            withdrawals_requested,
            withdrawals_resolved,
            registry,
        })
    }

    /// Record a resolved withdrawal
    pub fn record_withdrawal_resolved(&self, decision: &str) {
        self.withdrawals_resolved.with_label_values(&[decision]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("submissions_created", &self.submissions_created.get())
            .field("submissions_approved", &self.submissions_approved.get())
            .field("reservation_drift", &self.reservation_drift.get())
            .finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
