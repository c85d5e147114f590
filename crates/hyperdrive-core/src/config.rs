//! Engine Configuration
//!
//! Aggregates the per-component tuning structs into the single `engine`
//! section the configuration loader deserializes.

use crate::analytics::AnalyticsConfig;
use crate::failover::FailoverConfig;
use crate::metrics_store::MetricsConfig;
use hyperdrive_domain::value_objects::{AdaptationSpeed, SelectionMode};
use serde::{Deserialize, Serialize};

/// Orchestrator façade tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum dispatch attempts per request, fallbacks included
    pub max_attempts: u32,
    /// Per-call dispatch timeout in milliseconds
    pub dispatch_timeout_ms: u64,
    /// Interval of the failover evaluation / weight adaptation loop
    pub evaluation_interval_secs: u64,
    /// Interval of the probe loop for Recovering providers
    pub probe_interval_secs: u64,
    /// Initial selection mode
    pub selection_mode: SelectionMode,
    /// Drift speed for adaptive weights
    pub adaptation_speed: AdaptationSpeed,
    /// Whether the adaptive feedback loop runs
    pub adaptive_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            dispatch_timeout_ms: 10_000,
            evaluation_interval_secs: 15,
            probe_interval_secs: 15,
            selection_mode: SelectionMode::PerformanceOptimized,
            adaptation_speed: AdaptationSpeed::Medium,
            adaptive_enabled: false,
        }
    }
}

/// Full engine tuning, one sub-section per component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Metrics store tuning
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Failover state machine tuning
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Analytics engine tuning
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Orchestrator façade tuning
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}
