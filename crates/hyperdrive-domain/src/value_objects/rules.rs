//! Replication and Failover Rule Documents
//!
//! Rule documents are configuration submitted as a whole (idempotent PUT,
//! no partial updates). Conditions and actions are tagged variants, one
//! concrete type per kind, checked by [`ReplicationRules::validate`] /
//! [`FailoverRules::validate`] when a document is constructed or accepted
//! at the configuration boundary.
//!
//! Trigger evaluation order is declaration order: the first matching
//! trigger fires and suppresses later triggers for the same provider until
//! its cool-down elapses.

use crate::error::{Error, Result};
use crate::value_objects::provider::ProviderType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Replication
// ============================================================================

/// Condition under which a replication trigger fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicationCondition {
    /// Fire on every write operation
    OnWrite,
    /// Fire on a periodic schedule
    Scheduled {
        /// Period between firings, in seconds
        every_secs: u64,
    },
    /// Fire only while the estimated per-operation cost stays below the
    /// threshold
    CostBelow {
        /// Maximum acceptable cost per replicated operation
        threshold: f64,
    },
    /// Fire for operations carrying a specific data type
    DataTypeMatch {
        /// The data type the operation must carry
        data_type: String,
    },
}

/// Synchronisation requirement for replica writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Secondaries are dispatched asynchronously; only the primary write is
    /// awaited
    #[default]
    BestEffort,
    /// The caller waits until `count` writes (primary included) succeed
    Quorum {
        /// Minimum successful writes, primary included
        count: u32,
    },
}

/// What a matching replication trigger does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationAction {
    /// Providers the data is replicated to
    pub target_providers: Vec<ProviderType>,
    /// Synchronisation requirement for this action
    #[serde(default)]
    pub sync: SyncPolicy,
}

/// A single replication trigger: condition plus action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationTrigger {
    /// Stable identifier, referenced from audit logs
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// When the trigger fires
    pub condition: ReplicationCondition,
    /// What happens when it fires
    pub action: ReplicationAction,
    /// Disabled triggers are skipped during evaluation
    pub enabled: bool,
}

impl ReplicationTrigger {
    /// Create an enabled trigger with a generated id
    pub fn new(
        name: impl Into<String>,
        condition: ReplicationCondition,
        action: ReplicationAction,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            condition,
            action,
            enabled: true,
        }
    }
}

/// Per-provider refinement of the global replication default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReplicationOverride {
    /// The provider the override applies to
    pub provider: ProviderType,
    /// Replica count for operations whose primary is this provider
    pub replica_count: u32,
    /// Target set replacing the global default
    pub target_providers: Vec<ProviderType>,
}

/// Per-data-type refinement of the global replication default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeReplicationOverride {
    /// The data type the override applies to
    pub data_type: String,
    /// Replica count for operations carrying this data type
    pub replica_count: u32,
    /// Target set replacing the global default
    pub target_providers: Vec<ProviderType>,
    /// Synchronisation requirement replacing the global default
    #[serde(default)]
    pub sync: SyncPolicy,
}

/// The full replication rule document
///
/// Overrides refine the global default; the first matching override wins
/// (data-type overrides are consulted before provider overrides, matching
/// the narrower-scope-first convention), else the global default applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRules {
    /// Whether replication is performed at all
    pub enabled: bool,
    /// Global default replica count (primary included)
    pub replica_count: u32,
    /// Global default target set
    pub default_targets: Vec<ProviderType>,
    /// Global default synchronisation requirement
    #[serde(default)]
    pub sync: SyncPolicy,
    /// Ordered trigger list, evaluated in declaration order
    #[serde(default)]
    pub triggers: Vec<ReplicationTrigger>,
    /// Per-provider overrides
    #[serde(default)]
    pub provider_overrides: Vec<ProviderReplicationOverride>,
    /// Per-data-type overrides
    #[serde(default)]
    pub data_type_overrides: Vec<DataTypeReplicationOverride>,
}

impl Default for ReplicationRules {
    fn default() -> Self {
        Self {
            enabled: true,
            replica_count: 1,
            default_targets: Vec::new(),
            sync: SyncPolicy::BestEffort,
            triggers: Vec::new(),
            provider_overrides: Vec::new(),
            data_type_overrides: Vec::new(),
        }
    }
}

impl ReplicationRules {
    /// Construct a validated document
    pub fn new(
        replica_count: u32,
        default_targets: Vec<ProviderType>,
        sync: SyncPolicy,
        triggers: Vec<ReplicationTrigger>,
    ) -> Result<Self> {
        let rules = Self {
            enabled: true,
            replica_count,
            default_targets,
            sync,
            triggers,
            provider_overrides: Vec::new(),
            data_type_overrides: Vec::new(),
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Validate the whole document
    ///
    /// Called by constructors and by the configuration surface before a
    /// deserialized document is accepted.
    pub fn validate(&self) -> Result<()> {
        if self.replica_count == 0 {
            return Err(Error::invalid_rule("replica_count must be at least 1"));
        }
        validate_sync(&self.sync, self.replica_count)?;
        for trigger in &self.triggers {
            if trigger.id.is_empty() {
                return Err(Error::invalid_rule("replication trigger id must not be empty"));
            }
            match &trigger.condition {
                ReplicationCondition::Scheduled { every_secs } if *every_secs == 0 => {
                    return Err(Error::invalid_rule(format!(
                        "trigger {}: schedule period must be non-zero",
                        trigger.id
                    )));
                }
                ReplicationCondition::CostBelow { threshold } if *threshold < 0.0 => {
                    return Err(Error::invalid_rule(format!(
                        "trigger {}: cost threshold must be non-negative",
                        trigger.id
                    )));
                }
                ReplicationCondition::DataTypeMatch { data_type } if data_type.is_empty() => {
                    return Err(Error::invalid_rule(format!(
                        "trigger {}: data type must not be empty",
                        trigger.id
                    )));
                }
                _ => {}
            }
            if trigger.action.target_providers.is_empty() {
                return Err(Error::invalid_rule(format!(
                    "trigger {}: target provider set must not be empty",
                    trigger.id
                )));
            }
            validate_sync(
                &trigger.action.sync,
                trigger.action.target_providers.len() as u32 + 1,
            )?;
        }
        for ov in &self.provider_overrides {
            if ov.replica_count == 0 {
                return Err(Error::invalid_rule(format!(
                    "override for {}: replica_count must be at least 1",
                    ov.provider
                )));
            }
        }
        for ov in &self.data_type_overrides {
            if ov.data_type.is_empty() {
                return Err(Error::invalid_rule("data-type override key must not be empty"));
            }
            if ov.replica_count == 0 {
                return Err(Error::invalid_rule(format!(
                    "override for {}: replica_count must be at least 1",
                    ov.data_type
                )));
            }
            validate_sync(&ov.sync, ov.replica_count)?;
        }
        Ok(())
    }
}

fn validate_sync(sync: &SyncPolicy, replica_count: u32) -> Result<()> {
    if let SyncPolicy::Quorum { count } = sync {
        if *count == 0 {
            return Err(Error::invalid_rule("quorum count must be at least 1"));
        }
        if *count > replica_count {
            return Err(Error::invalid_rule(format!(
                "quorum count {count} exceeds replica count {replica_count}"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Failover
// ============================================================================

/// Condition under which a failover trigger fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailoverCondition {
    /// EWMA error rate above the threshold over the evaluation window
    ErrorRateAbove {
        /// Error-rate threshold in (0, 1]
        threshold: f64,
    },
    /// Decayed p95 latency above the threshold
    LatencyAbove {
        /// Latency threshold in milliseconds
        threshold_ms: f64,
    },
    /// At least `count` consecutive failures
    ConsecutiveFailures {
        /// Consecutive failure count
        count: u32,
    },
    /// Analytics-predicted failure probability above the threshold
    PredictedRiskAbove {
        /// Failure probability threshold in (0, 1]
        probability: f64,
    },
}

/// Escalation severity, ordered from lowest to highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// Degrades the provider
    #[default]
    Low,
    /// Degrades the provider and prefers the fallback ordering
    Medium,
    /// Isolates an already-degraded provider
    High,
    /// Isolates the provider regardless of its current state
    Critical,
}

/// What happens when a failover trigger fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Escalation severity
    pub level: EscalationLevel,
    /// Fallback provider ordering tried before the general ranking
    pub fallback_providers: Vec<ProviderType>,
    /// Cool-down before the provider leaves Isolated and before further
    /// triggers may fire for it
    pub cooldown_secs: u64,
}

/// A single failover trigger: condition plus escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverTrigger {
    /// Stable identifier, referenced from circuit transition audit records
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// When the trigger fires
    pub condition: FailoverCondition,
    /// What happens when it fires
    pub escalation: EscalationRule,
    /// Disabled triggers are skipped during evaluation
    pub enabled: bool,
}

impl FailoverTrigger {
    /// Create an enabled trigger with a generated id
    pub fn new(
        name: impl Into<String>,
        condition: FailoverCondition,
        escalation: EscalationRule,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            condition,
            escalation,
            enabled: true,
        }
    }
}

/// The full failover rule document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverRules {
    /// Whether automatic failover is performed at all
    pub enabled: bool,
    /// Ordered trigger list, evaluated in declaration order; the first
    /// match fires and suppresses the rest for that provider until its
    /// cool-down elapses
    #[serde(default)]
    pub triggers: Vec<FailoverTrigger>,
}

impl Default for FailoverRules {
    fn default() -> Self {
        Self {
            enabled: true,
            triggers: Vec::new(),
        }
    }
}

impl FailoverRules {
    /// Construct a validated document
    pub fn new(triggers: Vec<FailoverTrigger>) -> Result<Self> {
        let rules = Self {
            enabled: true,
            triggers,
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Validate the whole document
    pub fn validate(&self) -> Result<()> {
        for trigger in &self.triggers {
            if trigger.id.is_empty() {
                return Err(Error::invalid_rule("failover trigger id must not be empty"));
            }
            match &trigger.condition {
                FailoverCondition::ErrorRateAbove { threshold } => {
                    if !(*threshold > 0.0 && *threshold <= 1.0) {
                        return Err(Error::invalid_rule(format!(
                            "trigger {}: error-rate threshold must be in (0, 1]",
                            trigger.id
                        )));
                    }
                }
                FailoverCondition::LatencyAbove { threshold_ms } => {
                    if *threshold_ms <= 0.0 {
                        return Err(Error::invalid_rule(format!(
                            "trigger {}: latency threshold must be positive",
                            trigger.id
                        )));
                    }
                }
                FailoverCondition::ConsecutiveFailures { count } => {
                    if *count == 0 {
                        return Err(Error::invalid_rule(format!(
                            "trigger {}: consecutive failure count must be at least 1",
                            trigger.id
                        )));
                    }
                }
                FailoverCondition::PredictedRiskAbove { probability } => {
                    if !(*probability > 0.0 && *probability <= 1.0) {
                        return Err(Error::invalid_rule(format!(
                            "trigger {}: risk probability must be in (0, 1]",
                            trigger.id
                        )));
                    }
                }
            }
            if trigger.escalation.cooldown_secs == 0 {
                return Err(Error::invalid_rule(format!(
                    "trigger {}: cool-down must be non-zero",
                    trigger.id
                )));
            }
        }
        Ok(())
    }
}

/// The decision the rule engine hands back when a failover trigger matches
///
/// The state machine applies it; the engine itself has no side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationAction {
    /// The trigger that matched
    pub trigger_id: String,
    /// Escalation severity
    pub level: EscalationLevel,
    /// Fallback ordering from the matched escalation rule
    pub fallback_providers: Vec<ProviderType>,
    /// Cool-down from the matched escalation rule
    pub cooldown_secs: u64,
    /// Evaluation inputs captured for the audit record
    pub inputs: String,
}

impl EscalationAction {
    /// Cool-down as a [`Duration`]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_trigger(id: &str) -> ReplicationTrigger {
        ReplicationTrigger {
            id: id.to_string(),
            name: format!("trigger {id}"),
            condition: ReplicationCondition::OnWrite,
            action: ReplicationAction {
                target_providers: vec![ProviderType::Ipfs],
                sync: SyncPolicy::BestEffort,
            },
            enabled: true,
        }
    }

    #[test]
    fn replication_rules_reject_zero_replicas() {
        let err = ReplicationRules::new(0, vec![], SyncPolicy::BestEffort, vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn quorum_must_fit_replica_count() {
        let err = ReplicationRules::new(
            2,
            vec![ProviderType::Ipfs, ProviderType::MongoDb],
            SyncPolicy::Quorum { count: 3 },
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));

        assert!(ReplicationRules::new(
            3,
            vec![ProviderType::Ipfs, ProviderType::MongoDb],
            SyncPolicy::Quorum { count: 2 },
            vec![],
        )
        .is_ok());
    }

    #[test]
    fn trigger_without_targets_is_rejected() {
        let mut trigger = write_trigger("t1");
        trigger.action.target_providers.clear();
        let err =
            ReplicationRules::new(1, vec![], SyncPolicy::BestEffort, vec![trigger]).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn failover_threshold_ranges_are_enforced() {
        let bad = FailoverTrigger {
            id: "f1".to_string(),
            name: "error spike".to_string(),
            condition: FailoverCondition::ErrorRateAbove { threshold: 1.5 },
            escalation: EscalationRule {
                level: EscalationLevel::Low,
                fallback_providers: vec![],
                cooldown_secs: 60,
            },
            enabled: true,
        };
        assert!(FailoverRules::new(vec![bad]).is_err());
    }

    #[test]
    fn rule_documents_round_trip_through_json() {
        let rules = ReplicationRules::new(
            3,
            vec![ProviderType::Ipfs, ProviderType::MongoDb, ProviderType::Holochain],
            SyncPolicy::Quorum { count: 2 },
            vec![write_trigger("t1")],
        )
        .unwrap();
        let json = serde_json::to_string(&rules).unwrap();
        let back: ReplicationRules = serde_json::from_str(&json).unwrap();
        assert_eq!(rules, back);

        let failover = FailoverRules::new(vec![FailoverTrigger {
            id: "f1".to_string(),
            name: "latency".to_string(),
            condition: FailoverCondition::LatencyAbove { threshold_ms: 500.0 },
            escalation: EscalationRule {
                level: EscalationLevel::High,
                fallback_providers: vec![ProviderType::Sqlite],
                cooldown_secs: 30,
            },
            enabled: true,
        }])
        .unwrap();
        let json = serde_json::to_string(&failover).unwrap();
        let back: FailoverRules = serde_json::from_str(&json).unwrap();
        assert_eq!(failover, back);
    }
}
