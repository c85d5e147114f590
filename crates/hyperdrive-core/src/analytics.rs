//! Analytics Engine
//!
//! Ingests immutable data points and failure events into a bounded,
//! retention-windowed series, aggregates them into reports, extrapolates
//! trends, and ranks providers by predicted failure risk. Its
//! recommendations feed back into the selector's adaptive weights and the
//! orchestrator's preventive-failover path.
//!
//! Forecasting is a least-squares linear fit over the retained series and
//! degrades to an explicit "insufficient data" answer below the configured
//! minimum sample count rather than fabricating a trend.

use chrono::{Duration as ChronoDuration, Utc};
use hyperdrive_domain::value_objects::{
    AnalyticsDataPoint, AnalyticsReport, FailoverPrediction, FailureEvent, OptimizationRecommendation,
    PredictiveAnalytics, ProviderAnalytics, ProviderFailurePrediction, ProviderType, RiskLevel,
    SelectionWeights, TimeRange,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

/// Analytics engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Maximum retained data points across all providers
    pub retention_capacity: usize,
    /// Age beyond which points are expired regardless of capacity
    pub retention_secs: i64,
    /// Minimum samples before a forecast is attempted
    pub min_forecast_samples: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            retention_capacity: 10_000,
            retention_secs: 30 * 86_400,
            min_forecast_samples: 12,
        }
    }
}

/// Time series store plus the derived views
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    points: RwLock<VecDeque<AnalyticsDataPoint>>,
    failures: RwLock<VecDeque<FailureEvent>>,
}

impl AnalyticsEngine {
    /// Create an engine with the given tuning
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            points: RwLock::new(VecDeque::new()),
            failures: RwLock::new(VecDeque::new()),
        }
    }

    /// Append a data point
    pub fn record(&self, point: AnalyticsDataPoint) {
        let mut points = self.points.write().expect("series lock poisoned");
        let cutoff = Utc::now() - ChronoDuration::seconds(self.config.retention_secs);
        while points.len() >= self.config.retention_capacity
            || points.front().is_some_and(|p| p.timestamp < cutoff)
        {
            if points.pop_front().is_none() {
                break;
            }
        }
        points.push_back(point);
    }

    /// Append a failure event
    pub fn record_failure(&self, event: FailureEvent) {
        let mut failures = self.failures.write().expect("series lock poisoned");
        if failures.len() >= self.config.retention_capacity {
            failures.pop_front();
        }
        failures.push_back(event);
    }

    /// Aggregate the retained series over a reporting window
    pub fn report(&self, provider: Option<ProviderType>, range: TimeRange) -> AnalyticsReport {
        let cutoff = Utc::now() - ChronoDuration::seconds(range.as_secs());
        let points = self.points.read().expect("series lock poisoned");

        let mut grouped: BTreeMap<ProviderType, Vec<&AnalyticsDataPoint>> = BTreeMap::new();
        for point in points.iter().filter(|p| p.timestamp >= cutoff) {
            if provider.is_some_and(|wanted| wanted != point.provider) {
                continue;
            }
            grouped.entry(point.provider).or_default().push(point);
        }

        let mut providers: Vec<ProviderAnalytics> = grouped
            .into_iter()
            .map(|(provider, samples)| {
                let total = samples.len() as u64;
                let successes = samples.iter().filter(|p| p.success).count() as u64;
                let latencies: Vec<f64> = samples.iter().map(|p| p.latency_ms).collect();
                let total_cost: f64 = samples.iter().map(|p| p.cost).sum();
                ProviderAnalytics {
                    provider,
                    total_requests: total,
                    successful_requests: successes,
                    failed_requests: total - successes,
                    average_latency_ms: latencies.iter().sum::<f64>() / total.max(1) as f64,
                    min_latency_ms: latencies.iter().copied().fold(f64::INFINITY, f64::min),
                    max_latency_ms: latencies.iter().copied().fold(0.0, f64::max),
                    total_cost,
                    error_rate: (total - successes) as f64 / total.max(1) as f64,
                }
            })
            .collect();

        let fleet_error_rate = if providers.is_empty() {
            0.0
        } else {
            providers.iter().map(|p| p.error_rate).sum::<f64>() / providers.len() as f64
        };

        let mut by_quality = providers.clone();
        by_quality.sort_by(|a, b| {
            let success_a = 1.0 - a.error_rate;
            let success_b = 1.0 - b.error_rate;
            success_b
                .partial_cmp(&success_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    a.average_latency_ms
                        .partial_cmp(&b.average_latency_ms)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        let top_performers = by_quality.iter().take(3).map(|p| p.provider).collect();
        let underperformers = providers
            .iter()
            .filter(|p| p.error_rate > fleet_error_rate && p.error_rate > 0.0)
            .map(|p| p.provider)
            .collect();

        providers.sort_by_key(|p| p.provider);
        AnalyticsReport {
            generated_at: Utc::now(),
            time_range: range,
            provider,
            providers,
            top_performers,
            underperformers,
        }
    }

    /// Extrapolate a provider's trend `days` ahead
    ///
    /// Below the configured sample minimum the forecast degrades to an
    /// "insufficient data" answer with zero confidence.
    pub fn predict(&self, provider: ProviderType, days: u32) -> PredictiveAnalytics {
        let points = self.points.read().expect("series lock poisoned");
        let samples: Vec<&AnalyticsDataPoint> =
            points.iter().filter(|p| p.provider == provider).collect();

        if samples.len() < self.config.min_forecast_samples {
            return PredictiveAnalytics {
                provider,
                forecast_days: days,
                confidence: 0.0,
                message: format!(
                    "insufficient data: {} of {} samples",
                    samples.len(),
                    self.config.min_forecast_samples
                ),
                predicted_success_rate: 0.0,
                predicted_latency_ms: 0.0,
                predicted_cost: 0.0,
            };
        }

        let t0 = samples[0].timestamp;
        let times: Vec<f64> = samples
            .iter()
            .map(|p| (p.timestamp - t0).num_seconds() as f64)
            .collect();
        let horizon = times.last().copied().unwrap_or(0.0) + days as f64 * 86_400.0;

        let success: Vec<f64> = samples
            .iter()
            .map(|p| if p.success { 1.0 } else { 0.0 })
            .collect();
        let latency: Vec<f64> = samples.iter().map(|p| p.latency_ms).collect();
        let cost: Vec<f64> = samples.iter().map(|p| p.cost).collect();

        let predict_at = |ys: &[f64]| -> f64 {
            let (intercept, slope) = linear_fit(&times, ys);
            intercept + slope * horizon
        };

        let n = samples.len() as f64;
        let confidence = (n / (n + 10.0)) * (1.0 / (1.0 + days as f64 / 30.0));

        PredictiveAnalytics {
            provider,
            forecast_days: days,
            confidence,
            message: format!("linear trend over {} samples", samples.len()),
            predicted_success_rate: predict_at(&success).clamp(0.0, 1.0),
            predicted_latency_ms: predict_at(&latency).max(0.0),
            predicted_cost: predict_at(&cost).max(0.0),
        }
    }

    /// Failure probability in [0, 1] for one provider, from recent error
    /// rate, latency trend, and failure-event density
    pub fn failure_probability(&self, provider: ProviderType) -> f64 {
        let points = self.points.read().expect("series lock poisoned");
        let samples: Vec<&AnalyticsDataPoint> =
            points.iter().filter(|p| p.provider == provider).collect();
        if samples.len() < self.config.min_forecast_samples {
            return 0.0;
        }

        let failures = samples.iter().filter(|p| !p.success).count() as f64;
        let error_rate = failures / samples.len() as f64;

        let t0 = samples[0].timestamp;
        let times: Vec<f64> = samples
            .iter()
            .map(|p| (p.timestamp - t0).num_seconds() as f64)
            .collect();
        let latency: Vec<f64> = samples.iter().map(|p| p.latency_ms).collect();
        let (_, latency_slope) = linear_fit(&times, &latency);
        // Positive slope means latency is worsening; normalize to [0, 1]
        // against a 1ms/min drift reference
        let latency_trend = (latency_slope * 60.0).clamp(0.0, 1.0);

        let day_ago = Utc::now() - ChronoDuration::days(1);
        let failure_events = self
            .failures
            .read()
            .expect("series lock poisoned")
            .iter()
            .filter(|e| e.provider == provider && e.timestamp >= day_ago)
            .count() as f64;
        let event_density = (failure_events / 10.0).clamp(0.0, 1.0);

        (0.7 * error_rate + 0.2 * latency_trend + 0.1 * event_density).clamp(0.0, 1.0)
    }

    /// Rank all observed providers by predicted failure risk
    pub fn failure_predictions(&self) -> FailoverPrediction {
        let observed: Vec<ProviderType> = {
            let points = self.points.read().expect("series lock poisoned");
            let mut providers: Vec<ProviderType> = points.iter().map(|p| p.provider).collect();
            providers.sort();
            providers.dedup();
            providers
        };

        let mut predictions: Vec<ProviderFailurePrediction> = observed
            .into_iter()
            .map(|provider| {
                let probability = self.failure_probability(provider);
                let sample_count = {
                    let points = self.points.read().expect("series lock poisoned");
                    points.iter().filter(|p| p.provider == provider).count()
                };
                let risk = if sample_count < self.config.min_forecast_samples {
                    RiskLevel::Unknown
                } else if probability < 0.2 {
                    RiskLevel::Low
                } else if probability < 0.5 {
                    RiskLevel::Medium
                } else if probability < 0.75 {
                    RiskLevel::High
                } else {
                    RiskLevel::Critical
                };
                let mut risk_factors = Vec::new();
                if probability >= 0.2 {
                    risk_factors.push(format!("failure probability {probability:.2}"));
                }
                ProviderFailurePrediction {
                    provider,
                    risk,
                    failure_probability: probability,
                    risk_factors,
                }
            })
            .collect();

        predictions.sort_by(|a, b| {
            b.failure_probability
                .partial_cmp(&a.failure_probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        FailoverPrediction {
            generated_at: Utc::now(),
            predictions,
        }
    }

    /// Cost/performance recommendations for providers with notable trends
    pub fn recommendations(&self) -> Vec<OptimizationRecommendation> {
        let report = self.report(None, TimeRange::Last24Hours);
        if report.providers.is_empty() {
            return Vec::new();
        }
        let fleet_cost: f64 = report.providers.iter().map(|p| p.total_cost).sum::<f64>()
            / report.providers.len() as f64;

        let mut recommendations = Vec::new();
        for p in &report.providers {
            if p.error_rate > 0.2 {
                recommendations.push(OptimizationRecommendation {
                    provider: p.provider,
                    suggested_weights: SelectionWeights {
                        cost: 0.1,
                        latency: 0.3,
                        reliability: 0.6,
                    },
                    description: format!(
                        "error rate {:.0}% over the last day; weight reliability",
                        p.error_rate * 100.0
                    ),
                    priority: RiskLevel::High,
                });
            } else if p.total_cost > fleet_cost * 1.5 && p.total_cost > 0.0 {
                recommendations.push(OptimizationRecommendation {
                    provider: p.provider,
                    suggested_weights: SelectionWeights {
                        cost: 0.6,
                        latency: 0.2,
                        reliability: 0.2,
                    },
                    description: format!(
                        "cost {:.4} is {:.1}x the fleet average; weight cost",
                        p.total_cost,
                        p.total_cost / fleet_cost.max(f64::EPSILON)
                    ),
                    priority: RiskLevel::Medium,
                });
            }
        }
        recommendations
    }

    /// Fleet-level weights for the adaptive selection mode
    ///
    /// Reliability weight grows with the fleet error rate, cost weight with
    /// cost dispersion; the result is normalized.
    pub fn recommended_weights(&self) -> SelectionWeights {
        let report = self.report(None, TimeRange::Last24Hours);
        if report.providers.is_empty() {
            return SelectionWeights {
                cost: 1.0 / 3.0,
                latency: 1.0 / 3.0,
                reliability: 1.0 / 3.0,
            };
        }

        let fleet_error: f64 = report.providers.iter().map(|p| p.error_rate).sum::<f64>()
            / report.providers.len() as f64;
        let costs: Vec<f64> = report.providers.iter().map(|p| p.total_cost).collect();
        let cost_max = costs.iter().copied().fold(0.0, f64::max);
        let cost_min = costs.iter().copied().fold(f64::INFINITY, f64::min);
        let cost_spread = if cost_max > 0.0 {
            ((cost_max - cost_min) / cost_max).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SelectionWeights {
            cost: 1.0 + cost_spread,
            latency: 1.0,
            reliability: 1.0 + 2.0 * fleet_error,
        }
        .normalized()
    }

    /// Number of retained data points
    pub fn len(&self) -> usize {
        self.points.read().expect("series lock poisoned").len()
    }

    /// Whether any data points are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

/// Least-squares fit returning (intercept, slope)
fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    if n < 2.0 {
        return (ys.first().copied().unwrap_or(0.0), 0.0);
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den.abs() < f64::EPSILON {
        return (mean_y, 0.0);
    }
    let slope = num / den;
    (mean_y - slope * mean_x, slope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(provider: ProviderType, success: bool, latency_ms: f64, age_secs: i64) -> AnalyticsDataPoint {
        AnalyticsDataPoint {
            timestamp: Utc::now() - ChronoDuration::seconds(age_secs),
            provider,
            success,
            latency_ms,
            cost: 0.01,
            region: String::new(),
            operation: "write".to_string(),
        }
    }

    #[test]
    fn forecast_degrades_below_minimum_samples() {
        let engine = AnalyticsEngine::default();
        for i in 0..5 {
            engine.record(point(ProviderType::Ipfs, true, 50.0, 100 - i));
        }
        let forecast = engine.predict(ProviderType::Ipfs, 7);
        assert_eq!(forecast.confidence, 0.0);
        assert!(forecast.message.contains("insufficient data"));
    }

    #[test]
    fn forecast_follows_a_worsening_latency_trend() {
        let engine = AnalyticsEngine::default();
        // Latency climbing from 50ms to 150ms over 100 minutes
        for i in 0..20_i64 {
            engine.record(point(
                ProviderType::Ipfs,
                true,
                50.0 + 5.0 * i as f64,
                6_000 - i * 300,
            ));
        }
        let forecast = engine.predict(ProviderType::Ipfs, 1);
        assert!(forecast.confidence > 0.0);
        assert!(forecast.predicted_latency_ms > 150.0);
    }

    #[test]
    fn report_aggregates_per_provider() {
        let engine = AnalyticsEngine::default();
        for i in 0..10 {
            engine.record(point(ProviderType::Ipfs, i % 2 == 0, 40.0, 60 + i as i64));
            engine.record(point(ProviderType::MongoDb, true, 20.0, 60 + i as i64));
        }
        let report = engine.report(None, TimeRange::LastHour);
        assert_eq!(report.providers.len(), 2);

        let ipfs = report
            .providers
            .iter()
            .find(|p| p.provider == ProviderType::Ipfs)
            .unwrap();
        assert_eq!(ipfs.total_requests, 10);
        assert_eq!(ipfs.failed_requests, 5);
        assert!(report.underperformers.contains(&ProviderType::Ipfs));
        assert_eq!(report.top_performers[0], ProviderType::MongoDb);
    }

    #[test]
    fn report_window_excludes_old_points() {
        let engine = AnalyticsEngine::default();
        engine.record(point(ProviderType::Ipfs, true, 40.0, 2 * 86_400));
        engine.record(point(ProviderType::Ipfs, true, 40.0, 10));
        let report = engine.report(None, TimeRange::LastHour);
        assert_eq!(report.providers[0].total_requests, 1);
    }

    #[test]
    fn failing_provider_ranks_first_in_failure_predictions() {
        let engine = AnalyticsEngine::default();
        for i in 0..20 {
            engine.record(point(ProviderType::Solana, i % 4 == 0, 100.0, 600 - i as i64));
            engine.record(point(ProviderType::Ipfs, true, 30.0, 600 - i as i64));
        }
        let predictions = engine.failure_predictions();
        assert_eq!(predictions.predictions[0].provider, ProviderType::Solana);
        assert!(predictions.predictions[0].failure_probability > 0.3);
        assert!(predictions.predictions[0].risk >= RiskLevel::Medium);
    }

    #[test]
    fn high_error_rate_produces_reliability_recommendation() {
        let engine = AnalyticsEngine::default();
        for i in 0..20 {
            engine.record(point(ProviderType::Solana, i % 2 == 0, 100.0, 600 - i as i64));
        }
        let recommendations = engine.recommendations();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].provider, ProviderType::Solana);
        assert!(recommendations[0].suggested_weights.reliability > 0.5);
    }

    #[test]
    fn retention_capacity_is_bounded() {
        let engine = AnalyticsEngine::new(AnalyticsConfig {
            retention_capacity: 10,
            retention_secs: 86_400,
            min_forecast_samples: 3,
        });
        for i in 0..50 {
            engine.record(point(ProviderType::Ipfs, true, 10.0, 50 - i as i64));
        }
        assert!(engine.len() <= 10);
    }

    #[test]
    fn recommended_weights_shift_toward_reliability_under_errors() {
        let engine = AnalyticsEngine::default();
        for i in 0..20 {
            engine.record(point(ProviderType::Ipfs, i % 2 == 0, 40.0, 600 - i as i64));
        }
        let weights = engine.recommended_weights();
        assert!(weights.reliability > weights.latency);
        assert!((weights.cost + weights.latency + weights.reliability - 1.0).abs() < 1e-9);
    }
}
