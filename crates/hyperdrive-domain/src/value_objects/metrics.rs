//! Performance Metrics Value Objects
//!
//! Point-in-time copies of the rolling per-provider performance state held
//! by the metrics store. All values are non-negative; the store's writer
//! path is the only mutator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a provider's rolling performance state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// EWMA median latency in milliseconds
    pub latency_p50_ms: f64,
    /// Decayed 95th-percentile latency in milliseconds
    pub latency_p95_ms: f64,
    /// EWMA success rate in [0, 1]
    pub success_rate: f64,
    /// Currently open connections
    pub open_connections: u64,
    /// EWMA requests per second
    pub requests_per_sec: f64,
    /// Total requests observed since the last reset
    pub total_requests: u64,
    /// Failed requests observed since the last reset
    pub failed_requests: u64,
    /// Accumulated cost since the last reset
    pub total_cost: f64,
    /// When the state last changed
    pub last_updated: DateTime<Utc>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            latency_p50_ms: 0.0,
            latency_p95_ms: 0.0,
            success_rate: 1.0,
            open_connections: 0,
            requests_per_sec: 0.0,
            total_requests: 0,
            failed_requests: 0,
            total_cost: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl PerformanceMetrics {
    /// Error rate in [0, 1], complementary to the EWMA success rate
    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate
    }

    /// Whether the snapshot has seen any traffic since the last reset
    pub fn has_samples(&self) -> bool {
        self.total_requests > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_are_optimistic() {
        let m = PerformanceMetrics::default();
        assert_eq!(m.success_rate, 1.0);
        assert_eq!(m.error_rate(), 0.0);
        assert!(!m.has_samples());
    }
}
