//! Quota and Subscription Value Objects
//!
//! Usage counters are monotonic within a billing cycle and reset exactly
//! once at the cycle boundary; the quota tracker in the application layer
//! owns that lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Free tier
    #[default]
    Free,
    /// Basic paid tier
    Basic,
    /// Professional tier
    Pro,
    /// Enterprise tier
    Enterprise,
}

/// Billing cycle length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    /// Counters reset monthly
    #[default]
    Monthly,
    /// Counters reset quarterly
    Quarterly,
    /// Counters reset yearly
    Yearly,
}

/// Resource categories metered against the plan
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Orchestrated operations
    Requests,
    /// Replica writes
    Replications,
    /// Failover activations
    Failovers,
    /// Stored bytes, metered in GB
    StorageGb,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Requests => "requests",
            ResourceKind::Replications => "replications",
            ResourceKind::Failovers => "failovers",
            ResourceKind::StorageGb => "storage-gb",
        };
        write!(f, "{name}")
    }
}

/// Alert raised when usage crosses a configured fraction of the limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAlert {
    /// Metered resource
    pub resource: ResourceKind,
    /// Fraction of the limit in (0, 1] at which the alert fires
    pub threshold: f64,
}

/// The full quota policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Plan tier
    pub plan: PlanType,
    /// Billing cycle governing counter resets
    pub cycle: BillingCycle,
    /// Per-resource limits for the cycle; absent resources are unmetered
    pub limits: BTreeMap<ResourceKind, u64>,
    /// Alert thresholds
    #[serde(default)]
    pub alerts: Vec<UsageAlert>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            plan: PlanType::Free,
            cycle: BillingCycle::Monthly,
            limits: BTreeMap::new(),
            alerts: Vec::new(),
        }
    }
}

impl QuotaPolicy {
    /// Limit for a resource, if it is metered
    pub fn limit(&self, resource: ResourceKind) -> Option<u64> {
        self.limits.get(&resource).copied()
    }

    /// Validate alert thresholds
    pub fn validate(&self) -> crate::error::Result<()> {
        for alert in &self.alerts {
            if !(alert.threshold > 0.0 && alert.threshold <= 1.0) {
                return Err(crate::error::Error::invalid_rule(format!(
                    "usage alert threshold for {} must be in (0, 1]",
                    alert.resource
                )));
            }
        }
        Ok(())
    }
}

/// Point-in-time copy of the metered usage for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UsageSnapshot {
    /// Units consumed in the current cycle
    pub used: u64,
    /// The plan limit, if the resource is metered
    pub limit: Option<u64>,
}

impl UsageSnapshot {
    /// Whether another unit would exceed the limit
    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}
