//! Shared server state

use hyperdrive_core::Orchestrator;
use std::sync::Arc;

/// State injected into every handler
pub struct ApiState {
    /// The orchestrator instance this server fronts
    pub orchestrator: Arc<Orchestrator>,
}

impl ApiState {
    /// Wrap an orchestrator for the HTTP surface
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}
