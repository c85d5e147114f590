//! Metrics Store
//!
//! Rolling per-provider performance state: EWMA latency and success rate,
//! a decayed latency reservoir for the p95, open-connection and throughput
//! counters. State is sharded per provider (one dashmap entry each), so
//! concurrent writers for different providers never contend and a snapshot
//! holds the entry lock only for the copy itself.

use chrono::Utc;
use dashmap::DashMap;
use hyperdrive_domain::constants::LATENCY_RESERVOIR_SIZE;
use hyperdrive_domain::value_objects::{PerformanceMetrics, ProviderType};
use metrics::{counter, histogram};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Metrics store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// EWMA smoothing factor in (0, 1]; higher weighs recent samples more
    pub ewma_alpha: f64,
    /// Window over which requests/sec is sampled before being blended
    pub rate_window_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.2,
            rate_window_secs: 5,
        }
    }
}

/// Mutable per-provider state behind one map entry
struct ProviderState {
    latency_ewma_ms: f64,
    success_ewma: f64,
    reservoir: Vec<f64>,
    open_connections: i64,
    requests_per_sec: f64,
    window_started: Instant,
    window_count: u64,
    total_requests: u64,
    failed_requests: u64,
    consecutive_failures: u32,
    total_cost: f64,
    last_updated: chrono::DateTime<Utc>,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            latency_ewma_ms: 0.0,
            success_ewma: 1.0,
            reservoir: Vec::with_capacity(LATENCY_RESERVOIR_SIZE),
            open_connections: 0,
            requests_per_sec: 0.0,
            window_started: Instant::now(),
            window_count: 0,
            total_requests: 0,
            failed_requests: 0,
            consecutive_failures: 0,
            total_cost: 0.0,
            last_updated: Utc::now(),
        }
    }

    fn p95(&self) -> f64 {
        if self.reservoir.is_empty() {
            return self.latency_ewma_ms;
        }
        let mut sorted = self.reservoir.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
    }

    fn snapshot(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            latency_p50_ms: self.latency_ewma_ms,
            latency_p95_ms: self.p95(),
            success_rate: self.success_ewma.clamp(0.0, 1.0),
            open_connections: self.open_connections.max(0) as u64,
            requests_per_sec: self.requests_per_sec,
            total_requests: self.total_requests,
            failed_requests: self.failed_requests,
            total_cost: self.total_cost,
            last_updated: self.last_updated,
        }
    }
}

/// Sharded rolling metrics for every provider
pub struct MetricsStore {
    config: MetricsConfig,
    states: DashMap<ProviderType, ProviderState>,
}

impl MetricsStore {
    /// Create a store with the given tuning
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    /// Record one dispatch outcome for a provider
    ///
    /// This is the single writer path for that provider's EWMA state; the
    /// entry lock covers exactly this update.
    pub fn record_outcome(
        &self,
        provider: ProviderType,
        success: bool,
        latency: Duration,
        cost: f64,
    ) {
        let latency_ms = latency.as_secs_f64() * 1_000.0;
        let alpha = self.config.ewma_alpha;
        let mut state = self.states.entry(provider).or_insert_with(ProviderState::new);

        state.total_requests += 1;
        state.total_cost += cost.max(0.0);
        if success {
            state.consecutive_failures = 0;
        } else {
            state.failed_requests += 1;
            state.consecutive_failures += 1;
        }

        if state.total_requests == 1 {
            state.latency_ewma_ms = latency_ms;
        } else {
            state.latency_ewma_ms = alpha * latency_ms + (1.0 - alpha) * state.latency_ewma_ms;
        }
        let sample = if success { 1.0 } else { 0.0 };
        state.success_ewma = alpha * sample + (1.0 - alpha) * state.success_ewma;

        // Decayed reservoir: fill, then evict a random slot so older samples
        // fade geometrically
        if state.reservoir.len() < LATENCY_RESERVOIR_SIZE {
            state.reservoir.push(latency_ms);
        } else {
            let idx = rand::thread_rng().gen_range(0..LATENCY_RESERVOIR_SIZE);
            state.reservoir[idx] = latency_ms;
        }

        state.window_count += 1;
        let elapsed = state.window_started.elapsed();
        if elapsed >= Duration::from_secs(self.config.rate_window_secs) {
            let rate = state.window_count as f64 / elapsed.as_secs_f64();
            state.requests_per_sec = if state.requests_per_sec == 0.0 {
                rate
            } else {
                alpha * rate + (1.0 - alpha) * state.requests_per_sec
            };
            state.window_started = Instant::now();
            state.window_count = 0;
        }

        state.last_updated = Utc::now();
        drop(state);

        let status = if success { "success" } else { "error" };
        counter!("hyperdrive_provider_requests_total", "provider" => provider.to_string(), "status" => status.to_string()).increment(1);
        histogram!("hyperdrive_provider_latency_ms", "provider" => provider.to_string())
            .record(latency_ms);
        debug!("Recorded outcome for {}: success={} latency={:.1}ms", provider, success, latency_ms);
    }

    /// Adjust the open connection count for a provider
    pub fn record_connection(&self, provider: ProviderType, delta: i64) {
        let mut state = self.states.entry(provider).or_insert_with(ProviderState::new);
        state.open_connections = (state.open_connections + delta).max(0);
        state.last_updated = Utc::now();
    }

    /// Consistent point-in-time copy of a provider's metrics
    ///
    /// Unknown providers report fresh (optimistic) metrics.
    pub fn snapshot(&self, provider: ProviderType) -> PerformanceMetrics {
        self.states
            .get(&provider)
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }

    /// Current consecutive-failure streak for a provider
    pub fn consecutive_failures(&self, provider: ProviderType) -> u32 {
        self.states
            .get(&provider)
            .map(|state| state.consecutive_failures)
            .unwrap_or(0)
    }

    /// Snapshots for every provider that has recorded state
    pub fn all_snapshots(&self) -> Vec<(ProviderType, PerformanceMetrics)> {
        self.states
            .iter()
            .map(|entry| (*entry.key(), entry.snapshot()))
            .collect()
    }

    /// Open connection counts for every provider with recorded state
    pub fn connection_counts(&self) -> Vec<(ProviderType, u64)> {
        self.states
            .iter()
            .map(|entry| (*entry.key(), entry.open_connections.max(0) as u64))
            .collect()
    }

    /// Zero one provider's counters (operator surface, not the hot path)
    pub fn reset_provider(&self, provider: ProviderType) {
        self.states.remove(&provider);
        debug!("Reset metrics for {}", provider);
    }

    /// Zero every provider's counters
    pub fn reset_all(&self) {
        self.states.clear();
        debug!("Reset metrics for all providers");
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}
