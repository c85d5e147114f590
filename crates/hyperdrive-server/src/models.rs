//! Request and response models for the HTTP surface

use chrono::{DateTime, Utc};
use hyperdrive_domain::value_objects::{
    CircuitState, CircuitTransition, PerformanceMetrics, RankedProvider, ResourceKind,
    SelectionMode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error body returned with non-2xx statuses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error description
    pub error: String,
}

impl ErrorBody {
    /// Wrap an error message
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Acknowledgement for configuration and operational writes
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the write was applied
    pub success: bool,
}

impl Ack {
    /// The applied acknowledgement
    pub fn applied() -> Self {
        Self { success: true }
    }
}

/// `GET /status` response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Selection mode in effect
    pub selection_mode: SelectionMode,
    /// Whether the adaptive feedback loop is running
    pub adaptive_enabled: bool,
    /// Registered providers
    pub total_providers: usize,
    /// Providers currently accepting general traffic
    pub active_providers: usize,
    /// When the status was assembled
    pub generated_at: DateTime<Utc>,
}

/// `GET /metrics` response: snapshot per provider
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Per-provider snapshots keyed by provider name
    pub providers: BTreeMap<String, PerformanceMetrics>,
}

/// `GET /connections` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    /// Open connection count per provider name
    pub connections: BTreeMap<String, u64>,
}

/// One provider's circuit state
#[derive(Debug, Serialize, Deserialize)]
pub struct CircuitEntry {
    /// Provider name
    pub provider: String,
    /// Current circuit state
    pub state: CircuitState,
}

/// `GET /circuits` response
#[derive(Debug, Serialize, Deserialize)]
pub struct CircuitsResponse {
    /// Per-provider circuit states
    pub states: Vec<CircuitEntry>,
    /// Most recent transitions, oldest first
    pub recent_transitions: Vec<CircuitTransition>,
}

/// `GET /best-provider` response
#[derive(Debug, Serialize, Deserialize)]
pub struct BestProviderResponse {
    /// Ranked candidates, best first
    pub ranked: Vec<RankedProvider>,
}

/// `PUT /mode` request and `GET /mode` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ModeDoc {
    /// The selection mode
    pub mode: SelectionMode,
}

/// `PUT /adaptive` request
#[derive(Debug, Serialize, Deserialize)]
pub struct AdaptiveDoc {
    /// Whether the adaptive feedback loop should run
    pub enabled: bool,
}

/// `POST /failover/preventive` request
#[derive(Debug, Serialize, Deserialize)]
pub struct PreventiveRequest {
    /// Opt-in list of high-risk providers, by name
    pub providers: Vec<String>,
}

/// `POST /failover/preventive` response
#[derive(Debug, Serialize, Deserialize)]
pub struct PreventiveResponse {
    /// Providers actually isolated
    pub isolated: usize,
}

/// `POST /record-request` body: an externally observed outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordRequestBody {
    /// Provider name
    pub provider: String,
    /// Whether the external call succeeded
    pub success: bool,
    /// Observed latency in milliseconds
    pub latency_ms: f64,
    /// Cost charged
    #[serde(default)]
    pub cost: f64,
}

/// Usage for one metered resource
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageEntry {
    /// The metered resource
    pub resource: ResourceKind,
    /// Units consumed this cycle
    pub used: u64,
    /// Plan limit, absent for unmetered resources
    pub limit: Option<u64>,
}

/// `GET /subscription/usage` response
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    /// Per-resource usage
    pub usage: Vec<UsageEntry>,
}
