//! Wallet operation counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Operation metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Completed fund operations.
    pub funds_total: AtomicU64,
    /// Completed withdrawals.
    pub withdrawals_total: AtomicU64,
    /// Completed conversions.
    pub conversions_total: AtomicU64,
    /// Operations refused with a business error.
    pub rejected_total: AtomicU64,
    /// Operations that failed internally.
    pub internal_errors_total: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund_completed(&self) {
        self.funds_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn withdrawal_completed(&self) {
        self.withdrawals_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conversion_completed(&self) {
        self.conversions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operation_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn internal_error(&self) {
        self.internal_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            funds_total: self.funds_total.load(Ordering::Relaxed),
            withdrawals_total: self.withdrawals_total.load(Ordering::Relaxed),
            conversions_total: self.conversions_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            internal_errors_total: self.internal_errors_total.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP fxwallet_funds_total Total completed fund operations
# TYPE fxwallet_funds_total counter
fxwallet_funds_total {}

# HELP fxwallet_withdrawals_total Total completed withdrawals
# TYPE fxwallet_withdrawals_total counter
fxwallet_withdrawals_total {}

# HELP fxwallet_conversions_total Total completed conversions
# TYPE fxwallet_conversions_total counter
fxwallet_conversions_total {}

# HELP fxwallet_rejected_total Total operations rejected by business rules
# TYPE fxwallet_rejected_total counter
fxwallet_rejected_total {}

# HELP fxwallet_internal_errors_total Total operations failed internally
# TYPE fxwallet_internal_errors_total counter
fxwallet_internal_errors_total {}
"#,
            snapshot.funds_total,
            snapshot.withdrawals_total,
            snapshot.conversions_total,
            snapshot.rejected_total,
            snapshot.internal_errors_total,
        )
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub funds_total: u64,
    pub withdrawals_total: u64,
    pub conversions_total: u64,
    pub rejected_total: u64,
    pub internal_errors_total: u64,
}

impl MetricsSnapshot {
    /// Operations that completed.
    pub fn completed(&self) -> u64 {
        self.funds_total + self.withdrawals_total + self.conversions_total
    }

    /// Operations that failed for any reason.
    pub fn failed(&self) -> u64 {
        self.rejected_total + self.internal_errors_total
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.fund_completed();
        metrics.fund_completed();
        metrics.conversion_completed();
        metrics.operation_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.funds_total, 2);
        assert_eq!(snapshot.completed(), 3);
        assert_eq!(snapshot.failed(), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.withdrawal_completed();

        let output = metrics.to_prometheus();
        assert!(output.contains("fxwallet_withdrawals_total 1"));
        assert!(output.contains("fxwallet_internal_errors_total 0"));
    }
}
