//! Rule Engine
//!
//! Pure evaluation of the replication and failover rule documents against
//! a metrics snapshot and per-request context. The engine reads rule
//! tables and returns decisions; the orchestrator and the failover state
//! machine apply them. This separation keeps rules unit-testable against
//! synthetic metrics without touching real providers.
//!
//! Override resolution for replication: data-type overrides are consulted
//! first (narrowest scope), then provider overrides, then the ordered
//! trigger list, then the global default. First match wins.
//! `Scheduled` triggers are driven by the background loop, not the
//! per-operation path, and are skipped here.

use hyperdrive_domain::error::Result;
use hyperdrive_domain::value_objects::{
    Capability, EscalationAction, FailoverCondition, FailoverRules, PerformanceMetrics,
    ProviderType, ReplicationCondition, ReplicationRules, SyncPolicy,
};
use std::sync::RwLock;

/// The replication decision for one operation
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationDecision {
    /// Full target set the write should reach (primary candidates included)
    pub targets: Vec<ProviderType>,
    /// Total writes wanted, primary included
    pub replica_count: u32,
    /// Synchronisation requirement
    pub sync: SyncPolicy,
    /// Rule or trigger that produced the decision, for audit logging
    pub matched: Option<String>,
}

impl ReplicationDecision {
    /// Decision for operations that do not replicate
    pub fn single() -> Self {
        Self {
            targets: Vec::new(),
            replica_count: 1,
            sync: SyncPolicy::BestEffort,
            matched: None,
        }
    }

    /// Whether the operation fans out beyond the primary
    pub fn replicates(&self) -> bool {
        self.replica_count > 1
    }
}

/// Inputs for one failover evaluation pass
///
/// Everything the conditions can reference, captured up front so the
/// evaluation itself stays pure.
#[derive(Debug, Clone)]
pub struct FailoverInputs {
    /// Point-in-time metrics for the provider
    pub snapshot: PerformanceMetrics,
    /// Current consecutive-failure streak
    pub consecutive_failures: u32,
    /// Analytics-predicted failure probability in [0, 1]
    pub predicted_risk: f64,
}

/// Holds the rule documents and evaluates them
pub struct RuleEngine {
    replication: RwLock<ReplicationRules>,
    failover: RwLock<FailoverRules>,
}

impl RuleEngine {
    /// Create an engine over validated rule documents
    pub fn new(replication: ReplicationRules, failover: FailoverRules) -> Result<Self> {
        replication.validate()?;
        failover.validate()?;
        Ok(Self {
            replication: RwLock::new(replication),
            failover: RwLock::new(failover),
        })
    }

    /// Current replication document
    pub fn replication_rules(&self) -> ReplicationRules {
        self.replication.read().expect("rules lock poisoned").clone()
    }

    /// Replace the replication document (full-document PUT semantics)
    pub fn set_replication_rules(&self, rules: ReplicationRules) -> Result<()> {
        rules.validate()?;
        *self.replication.write().expect("rules lock poisoned") = rules;
        Ok(())
    }

    /// Current failover document
    pub fn failover_rules(&self) -> FailoverRules {
        self.failover.read().expect("rules lock poisoned").clone()
    }

    /// Replace the failover document (full-document PUT semantics)
    pub fn set_failover_rules(&self, rules: FailoverRules) -> Result<()> {
        rules.validate()?;
        *self.failover.write().expect("rules lock poisoned") = rules;
        Ok(())
    }

    /// Decide the replication target set for one operation
    ///
    /// `cost_estimate` is the cheapest capable provider's per-operation
    /// cost, used by `CostBelow` triggers.
    pub fn evaluate_replication(
        &self,
        capability: Capability,
        data_type: &str,
        cost_estimate: f64,
    ) -> ReplicationDecision {
        let rules = self.replication.read().expect("rules lock poisoned");

        if !rules.enabled || capability != Capability::Write {
            return ReplicationDecision::single();
        }

        // Narrowest scope first: data-type overrides
        if !data_type.is_empty() {
            if let Some(ov) = rules
                .data_type_overrides
                .iter()
                .find(|ov| ov.data_type == data_type)
            {
                return ReplicationDecision {
                    targets: ov.target_providers.clone(),
                    replica_count: ov.replica_count,
                    sync: ov.sync,
                    matched: Some(format!("data-type:{}", ov.data_type)),
                };
            }
        }

        // Provider overrides narrow the default target set
        if let Some(ov) = rules
            .provider_overrides
            .iter()
            .find(|ov| rules.default_targets.contains(&ov.provider))
        {
            return ReplicationDecision {
                targets: ov.target_providers.clone(),
                replica_count: ov.replica_count,
                sync: rules.sync,
                matched: Some(format!("provider:{}", ov.provider)),
            };
        }

        // Ordered trigger list, first match wins
        for trigger in rules.triggers.iter().filter(|t| t.enabled) {
            let matches = match &trigger.condition {
                ReplicationCondition::OnWrite => true,
                ReplicationCondition::Scheduled { .. } => false,
                ReplicationCondition::CostBelow { threshold } => cost_estimate < *threshold,
                ReplicationCondition::DataTypeMatch { data_type: wanted } => wanted == data_type,
            };
            if matches {
                return ReplicationDecision {
                    targets: trigger.action.target_providers.clone(),
                    replica_count: (trigger.action.target_providers.len() as u32 + 1)
                        .min(rules.replica_count.max(2)),
                    sync: trigger.action.sync,
                    matched: Some(format!("trigger:{}", trigger.id)),
                };
            }
        }

        // Global default
        if rules.replica_count > 1 && !rules.default_targets.is_empty() {
            return ReplicationDecision {
                targets: rules.default_targets.clone(),
                replica_count: rules.replica_count,
                sync: rules.sync,
                matched: Some("default".to_string()),
            };
        }

        ReplicationDecision::single()
    }

    /// Evaluate the failover triggers for one provider
    ///
    /// Declaration order is evaluation order; the first matching enabled
    /// trigger produces the action. Suppression during cool-down is the
    /// state machine's concern, not the engine's.
    pub fn evaluate_failover(
        &self,
        provider: ProviderType,
        inputs: &FailoverInputs,
    ) -> Option<EscalationAction> {
        let rules = self.failover.read().expect("rules lock poisoned");
        if !rules.enabled {
            return None;
        }

        for trigger in rules.triggers.iter().filter(|t| t.enabled) {
            let (matches, observed) = match &trigger.condition {
                FailoverCondition::ErrorRateAbove { threshold } => (
                    inputs.snapshot.has_samples() && inputs.snapshot.error_rate() > *threshold,
                    format!("error_rate={:.3}", inputs.snapshot.error_rate()),
                ),
                FailoverCondition::LatencyAbove { threshold_ms } => (
                    inputs.snapshot.has_samples() && inputs.snapshot.latency_p95_ms > *threshold_ms,
                    format!("latency_p95={:.1}ms", inputs.snapshot.latency_p95_ms),
                ),
                FailoverCondition::ConsecutiveFailures { count } => (
                    inputs.consecutive_failures >= *count,
                    format!("consecutive_failures={}", inputs.consecutive_failures),
                ),
                FailoverCondition::PredictedRiskAbove { probability } => (
                    inputs.predicted_risk > *probability,
                    format!("predicted_risk={:.3}", inputs.predicted_risk),
                ),
            };
            if matches {
                return Some(EscalationAction {
                    trigger_id: trigger.id.clone(),
                    level: trigger.escalation.level,
                    fallback_providers: trigger.escalation.fallback_providers.clone(),
                    cooldown_secs: trigger.escalation.cooldown_secs,
                    inputs: format!("provider={provider} {observed}"),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdrive_domain::value_objects::{
        DataTypeReplicationOverride, EscalationLevel, EscalationRule, FailoverTrigger,
        ReplicationAction, ReplicationTrigger,
    };

    fn engine_with_replication(rules: ReplicationRules) -> RuleEngine {
        RuleEngine::new(rules, FailoverRules::default()).unwrap()
    }

    fn snapshot_with_error_rate(rate: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            success_rate: 1.0 - rate,
            total_requests: 100,
            ..Default::default()
        }
    }

    #[test]
    fn reads_never_replicate() {
        let rules = ReplicationRules {
            replica_count: 3,
            default_targets: vec![ProviderType::Ipfs, ProviderType::MongoDb],
            ..Default::default()
        };
        let engine = engine_with_replication(rules);
        let decision = engine.evaluate_replication(Capability::Read, "avatar", 0.0);
        assert!(!decision.replicates());
    }

    #[test]
    fn data_type_override_wins_over_default() {
        let rules = ReplicationRules {
            replica_count: 3,
            default_targets: vec![ProviderType::Ipfs, ProviderType::MongoDb],
            data_type_overrides: vec![DataTypeReplicationOverride {
                data_type: "nft".to_string(),
                replica_count: 2,
                target_providers: vec![ProviderType::Ethereum],
                sync: SyncPolicy::Quorum { count: 2 },
            }],
            ..Default::default()
        };
        let engine = engine_with_replication(rules);

        let decision = engine.evaluate_replication(Capability::Write, "nft", 0.0);
        assert_eq!(decision.targets, vec![ProviderType::Ethereum]);
        assert_eq!(decision.replica_count, 2);
        assert_eq!(decision.matched.as_deref(), Some("data-type:nft"));

        let decision = engine.evaluate_replication(Capability::Write, "avatar", 0.0);
        assert_eq!(decision.matched.as_deref(), Some("default"));
        assert_eq!(decision.replica_count, 3);
    }

    #[test]
    fn first_matching_trigger_wins() {
        let trigger = |id: &str, condition| ReplicationTrigger {
            id: id.to_string(),
            name: id.to_string(),
            condition,
            action: ReplicationAction {
                target_providers: vec![ProviderType::Ipfs],
                sync: SyncPolicy::BestEffort,
            },
            enabled: true,
        };
        let rules = ReplicationRules {
            replica_count: 2,
            triggers: vec![
                trigger("cheap", ReplicationCondition::CostBelow { threshold: 0.5 }),
                trigger("always", ReplicationCondition::OnWrite),
            ],
            ..Default::default()
        };
        let engine = engine_with_replication(rules);

        let decision = engine.evaluate_replication(Capability::Write, "", 0.1);
        assert_eq!(decision.matched.as_deref(), Some("trigger:cheap"));

        let decision = engine.evaluate_replication(Capability::Write, "", 0.9);
        assert_eq!(decision.matched.as_deref(), Some("trigger:always"));
    }

    #[test]
    fn failover_triggers_evaluate_in_declaration_order() {
        let trigger = |id: &str, condition, level| FailoverTrigger {
            id: id.to_string(),
            name: id.to_string(),
            condition,
            escalation: EscalationRule {
                level,
                fallback_providers: vec![],
                cooldown_secs: 60,
            },
            enabled: true,
        };
        let failover = FailoverRules::new(vec![
            trigger(
                "errors",
                FailoverCondition::ErrorRateAbove { threshold: 0.2 },
                EscalationLevel::Low,
            ),
            trigger(
                "streak",
                FailoverCondition::ConsecutiveFailures { count: 3 },
                EscalationLevel::High,
            ),
        ])
        .unwrap();
        let engine = RuleEngine::new(ReplicationRules::default(), failover).unwrap();

        // Both conditions hold; declaration order means "errors" fires
        let action = engine
            .evaluate_failover(
                ProviderType::Ipfs,
                &FailoverInputs {
                    snapshot: snapshot_with_error_rate(0.5),
                    consecutive_failures: 10,
                    predicted_risk: 0.0,
                },
            )
            .unwrap();
        assert_eq!(action.trigger_id, "errors");
        assert_eq!(action.level, EscalationLevel::Low);

        // Only the streak condition holds
        let action = engine
            .evaluate_failover(
                ProviderType::Ipfs,
                &FailoverInputs {
                    snapshot: snapshot_with_error_rate(0.1),
                    consecutive_failures: 4,
                    predicted_risk: 0.0,
                },
            )
            .unwrap();
        assert_eq!(action.trigger_id, "streak");
    }

    #[test]
    fn no_samples_means_no_error_rate_trigger() {
        let failover = FailoverRules::new(vec![FailoverTrigger {
            id: "errors".to_string(),
            name: "errors".to_string(),
            condition: FailoverCondition::ErrorRateAbove { threshold: 0.1 },
            escalation: EscalationRule {
                level: EscalationLevel::Low,
                fallback_providers: vec![],
                cooldown_secs: 60,
            },
            enabled: true,
        }])
        .unwrap();
        let engine = RuleEngine::new(ReplicationRules::default(), failover).unwrap();

        let action = engine.evaluate_failover(
            ProviderType::Ipfs,
            &FailoverInputs {
                snapshot: PerformanceMetrics::default(),
                consecutive_failures: 0,
                predicted_risk: 0.0,
            },
        );
        assert!(action.is_none());
    }
}
