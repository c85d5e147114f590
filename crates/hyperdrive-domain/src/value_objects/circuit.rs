//! Circuit State Value Objects
//!
//! Per-provider health classification driving routing eligibility. Only the
//! failover state machine mutates circuit state; every transition is
//! recorded with the triggering rule and its evaluation inputs.

use crate::value_objects::provider::ProviderType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-provider circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CircuitState {
    /// Provider receives general traffic
    #[default]
    Healthy,
    /// A failover trigger matched; provider still receives traffic
    Degraded,
    /// Provider receives no traffic until cool-down elapses
    Isolated,
    /// Provider receives probe traffic only
    Recovering,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Healthy => "healthy",
            CircuitState::Degraded => "degraded",
            CircuitState::Isolated => "isolated",
            CircuitState::Recovering => "recovering",
        };
        write!(f, "{name}")
    }
}

impl CircuitState {
    /// Whether the selector may route general traffic to the provider
    pub fn accepts_traffic(&self) -> bool {
        matches!(self, CircuitState::Healthy | CircuitState::Degraded)
    }
}

/// Audit record of a single circuit transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitTransition {
    /// The provider whose circuit moved
    pub provider: ProviderType,
    /// State before the transition
    pub from: CircuitState,
    /// State after the transition
    pub to: CircuitState,
    /// Identifier of the rule that fired, or a machine-internal cause
    /// ("cooldown-elapsed", "probe-success", "probe-failure", "preventive")
    pub cause: String,
    /// Evaluation inputs at the moment of the transition
    pub inputs: String,
    /// When the transition happened
    pub at: DateTime<Utc>,
}
