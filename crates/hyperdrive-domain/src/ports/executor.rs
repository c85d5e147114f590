//! Provider Executor Port
//!
//! The single contract a concrete backend adapter must implement to
//! participate in orchestration. The core does not know or care about RPC
//! dialects; it sees an opaque capability-tagged executor with an
//! observable latency/success/cost signal.

use crate::error::Result;
use crate::value_objects::provider::Capability;
use async_trait::async_trait;
use std::time::Duration;

/// What one executor invocation produced
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOutcome {
    /// Response payload
    pub payload: serde_json::Value,
    /// Observed latency
    pub latency: Duration,
    /// Cost charged for the call
    pub cost: f64,
}

/// Capability-typed contract implemented by every backend adapter
///
/// The executor owns its own cancellation contract: when the orchestrator
/// abandons a call (deadline or caller cancellation), the in-flight future
/// is dropped and whatever the adapter does about it is its business.
#[async_trait]
pub trait ProviderExecutor: Send + Sync {
    /// Execute one operation against the backend
    ///
    /// `deadline` is advisory for adapters that can push it down to their
    /// transport; the orchestrator enforces it regardless.
    async fn invoke(
        &self,
        capability: Capability,
        payload: &serde_json::Value,
        deadline: Duration,
    ) -> Result<InvokeOutcome>;
}
