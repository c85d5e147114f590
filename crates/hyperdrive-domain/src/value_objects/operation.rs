//! Operation Request and Result Value Objects
//!
//! The orchestrator's caller-facing vocabulary: what to run, under which
//! selection mode, and what happened — including the degraded-success shape
//! for partial replication.

use crate::value_objects::permissions::AccessContext;
use crate::value_objects::provider::{Capability, ProviderType};
use serde::{Deserialize, Serialize};

/// The weighting policy used to rank providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Cost dominates the score
    CostOptimized,
    /// Latency and reliability dominate the score
    #[default]
    PerformanceOptimized,
    /// Weights follow the analytics engine's current recommendation
    Adaptive,
}

impl std::str::FromStr for SelectionMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost_optimized" | "cost" => Ok(SelectionMode::CostOptimized),
            "performance_optimized" | "performance" => Ok(SelectionMode::PerformanceOptimized),
            "adaptive" | "intelligent" => Ok(SelectionMode::Adaptive),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown selection mode: {other}"
            ))),
        }
    }
}

/// How fast adaptive weights may drift per evaluation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationSpeed {
    /// Max weight delta 0.02 per cycle
    Slow,
    /// Max weight delta 0.05 per cycle
    #[default]
    Medium,
    /// Max weight delta 0.10 per cycle
    Fast,
}

impl AdaptationSpeed {
    /// Maximum per-cycle change of any single weight
    pub fn max_delta(&self) -> f64 {
        match self {
            AdaptationSpeed::Slow => 0.02,
            AdaptationSpeed::Medium => 0.05,
            AdaptationSpeed::Fast => 0.10,
        }
    }
}

/// A request submitted to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// The capability the operation needs
    pub capability: Capability,
    /// Data type carried by the operation, matched by replication rules
    /// and permission layers
    #[serde(default)]
    pub data_type: String,
    /// Opaque payload handed to the executor
    pub payload: serde_json::Value,
    /// Caller authorization context for permission evaluation
    #[serde(default)]
    pub access: AccessContext,
    /// Preferred region for geographic affinity, if any
    #[serde(default)]
    pub region: Option<String>,
    /// Providers the caller wants excluded
    #[serde(default)]
    pub exclude: Vec<ProviderType>,
}

impl OperationRequest {
    /// Create a request for a capability with an opaque payload
    pub fn new(capability: Capability, payload: serde_json::Value) -> Self {
        Self {
            capability,
            data_type: String::new(),
            payload,
            access: AccessContext::default(),
            region: None,
            exclude: Vec::new(),
        }
    }

    /// Tag the request with a data type
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Attach the caller's access context
    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }
}

/// Outcome of one replica write during fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaOutcome {
    /// The replica target
    pub provider: ProviderType,
    /// Whether the replica write succeeded
    pub success: bool,
    /// Failure detail when it did not
    pub error: Option<String>,
}

/// Fan-out summary attached to a replicated write result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReplicationReport {
    /// Replicas requested (primary excluded)
    pub requested: u32,
    /// Replicas confirmed successful at return time
    pub succeeded: u32,
    /// Per-target outcomes; asynchronous targets may be absent
    pub outcomes: Vec<ReplicaOutcome>,
}

impl ReplicationReport {
    /// Targets that failed, for the degraded-success detail
    pub fn failed_targets(&self) -> Vec<ProviderType> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.provider)
            .collect()
    }
}

/// The orchestrator's result for a completed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// The provider whose response is returned
    pub served_by: ProviderType,
    /// Executor response payload
    pub payload: serde_json::Value,
    /// Dispatch attempts consumed, fallbacks included
    pub attempts: u32,
    /// Latency of the successful dispatch in milliseconds
    pub latency_ms: f64,
    /// Cost of the successful dispatch
    pub cost: f64,
    /// Fan-out summary for replicated writes
    pub replication: Option<ReplicationReport>,
    /// True when the primary succeeded but some required replicas failed
    pub degraded: bool,
}

/// A provider with its selection score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProvider {
    /// The scored provider
    pub provider: ProviderType,
    /// Combined score in [0, 1], higher is better
    pub score: f64,
    /// Success rate used for tie-breaking
    pub success_rate: f64,
}
