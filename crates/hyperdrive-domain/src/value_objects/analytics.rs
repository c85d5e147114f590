//! Analytics Value Objects
//!
//! Immutable, timestamped facts appended to the analytics time series, and
//! the aggregate shapes derived from them. Facts are never mutated after
//! creation, only aggregated or expired by the retention policy.

use crate::value_objects::provider::ProviderType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded operation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDataPoint {
    /// When the operation completed
    pub timestamp: DateTime<Utc>,
    /// The provider that served it
    pub provider: ProviderType,
    /// Whether the operation succeeded
    pub success: bool,
    /// Observed latency in milliseconds
    pub latency_ms: f64,
    /// Cost charged for the operation
    pub cost: f64,
    /// Region the operation was served from
    #[serde(default)]
    pub region: String,
    /// Operation label, e.g. "write" or "probe"
    #[serde(default)]
    pub operation: String,
}

/// A sampled snapshot of provider-level load indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDataPoint {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// The sampled provider
    pub provider: ProviderType,
    /// Latency in milliseconds at sample time
    pub latency_ms: f64,
    /// Error rate in [0, 1] at sample time
    pub error_rate: f64,
    /// Requests per second at sample time
    pub requests_per_sec: f64,
    /// Open connections at sample time
    pub open_connections: u64,
}

/// Failure taxonomy carried on failure events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Dispatch deadline exceeded
    Timeout,
    /// Transport-level failure
    ConnectionError,
    /// Backend rate limiting
    RateLimitExceeded,
    /// Backend reported unavailability
    ServiceUnavailable,
    /// Responses slow enough to trip a trigger
    PerformanceDegradation,
    /// Anything else the executor reported
    Other,
}

/// A recorded provider failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// When the failure happened
    pub timestamp: DateTime<Utc>,
    /// The failing provider
    pub provider: ProviderType,
    /// Failure classification
    pub failure_type: FailureType,
    /// Free-form description from the executor
    pub description: String,
}

/// Reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// The last hour
    LastHour,
    /// The last 24 hours
    #[default]
    Last24Hours,
    /// The last 7 days
    Last7Days,
    /// The last 30 days
    Last30Days,
}

impl TimeRange {
    /// Window length in seconds
    pub fn as_secs(&self) -> i64 {
        match self {
            TimeRange::LastHour => 3_600,
            TimeRange::Last24Hours => 86_400,
            TimeRange::Last7Days => 7 * 86_400,
            TimeRange::Last30Days => 30 * 86_400,
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last_hour" => Ok(TimeRange::LastHour),
            "last_24_hours" => Ok(TimeRange::Last24Hours),
            "last_7_days" => Ok(TimeRange::Last7Days),
            "last_30_days" => Ok(TimeRange::Last30Days),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown time range: {other}"
            ))),
        }
    }
}

/// Per-provider aggregate over a reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnalytics {
    /// The aggregated provider
    pub provider: ProviderType,
    /// Operations observed in the window
    pub total_requests: u64,
    /// Successful operations in the window
    pub successful_requests: u64,
    /// Failed operations in the window
    pub failed_requests: u64,
    /// Mean latency over the window
    pub average_latency_ms: f64,
    /// Fastest observed operation
    pub min_latency_ms: f64,
    /// Slowest observed operation
    pub max_latency_ms: f64,
    /// Cost accumulated in the window
    pub total_cost: f64,
    /// Error rate over the window
    pub error_rate: f64,
}

/// Full aggregation over a reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// The window aggregated over
    pub time_range: TimeRange,
    /// Restriction to one provider, if requested
    pub provider: Option<ProviderType>,
    /// Per-provider aggregates
    pub providers: Vec<ProviderAnalytics>,
    /// Providers ordered best-first by success rate then latency
    pub top_performers: Vec<ProviderType>,
    /// Providers whose error rate exceeds the fleet average
    pub underperformers: Vec<ProviderType>,
}

/// Trend forecast for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveAnalytics {
    /// The forecast provider
    pub provider: ProviderType,
    /// Days extrapolated forward
    pub forecast_days: u32,
    /// Confidence in [0, 1]; 0.0 when data was insufficient
    pub confidence: f64,
    /// Human-readable summary ("insufficient data" when degraded)
    pub message: String,
    /// Predicted success rate at the horizon
    pub predicted_success_rate: f64,
    /// Predicted mean latency at the horizon
    pub predicted_latency_ms: f64,
    /// Predicted per-operation cost at the horizon
    pub predicted_cost: f64,
}

/// Predicted-risk classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Not enough data to classify
    #[default]
    Unknown,
    /// Failure unlikely
    Low,
    /// Elevated failure probability
    Medium,
    /// Failure likely without intervention
    High,
    /// Failure imminent
    Critical,
}

/// Predicted failure risk for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailurePrediction {
    /// The assessed provider
    pub provider: ProviderType,
    /// Risk classification
    pub risk: RiskLevel,
    /// Failure probability in [0, 1]
    pub failure_probability: f64,
    /// Observed factors behind the score
    pub risk_factors: Vec<String>,
}

/// Fleet-wide failure risk ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverPrediction {
    /// When the ranking was computed
    pub generated_at: DateTime<Utc>,
    /// Per-provider predictions, highest risk first
    pub predictions: Vec<ProviderFailurePrediction>,
}

/// Scoring weights driving adaptive selection
///
/// Invariant: the three weights are positive and sum to 1.0 after
/// normalisation by the analytics engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionWeights {
    /// Weight of the normalized cost signal
    pub cost: f64,
    /// Weight of the normalized latency signal
    pub latency: f64,
    /// Weight of the normalized reliability signal
    pub reliability: f64,
}

impl SelectionWeights {
    /// Normalize the weights to sum to 1.0
    pub fn normalized(self) -> Self {
        let sum = self.cost + self.latency + self.reliability;
        if sum <= f64::EPSILON {
            return Self {
                cost: 1.0 / 3.0,
                latency: 1.0 / 3.0,
                reliability: 1.0 / 3.0,
            };
        }
        Self {
            cost: self.cost / sum,
            latency: self.latency / sum,
            reliability: self.reliability / sum,
        }
    }
}

/// A cost or performance recommendation derived from the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    /// The provider the recommendation concerns
    pub provider: ProviderType,
    /// Suggested selection weights when following the recommendation
    pub suggested_weights: SelectionWeights,
    /// Why the recommendation was made
    pub description: String,
    /// Higher is more urgent
    pub priority: RiskLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_normalize_to_unit_sum() {
        let w = SelectionWeights {
            cost: 2.0,
            latency: 1.0,
            reliability: 1.0,
        }
        .normalized();
        assert!((w.cost + w.latency + w.reliability - 1.0).abs() < 1e-9);
        assert!((w.cost - 0.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_weights_fall_back_to_uniform() {
        let w = SelectionWeights {
            cost: 0.0,
            latency: 0.0,
            reliability: 0.0,
        }
        .normalized();
        assert!((w.cost - 1.0 / 3.0).abs() < 1e-9);
    }
}
