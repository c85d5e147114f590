//! Selector
//!
//! Scores eligible providers for a requested capability and selection mode
//! and returns a ranked list. Ineligible providers (Isolated or Recovering
//! circuit, quota exhaustion, provider-level permission denial, caller
//! exclusion) are removed before scoring, not penalized within it.
//!
//! Scoring combines normalized (0-1) latency, success rate, cost, and a
//! bounded geographic-affinity bonus with mode-dependent weights. Adaptive
//! weights drift toward the analytics recommendation with the per-cycle
//! change capped by the configured adaptation speed, so selection cannot
//! oscillate.

use crate::failover::FailoverStateMachine;
use crate::metrics_store::MetricsStore;
use crate::permissions::PermissionEvaluator;
use crate::quota::QuotaTracker;
use crate::registry::ProviderRegistry;
use hyperdrive_domain::constants::{
    ADAPTIVE_WEIGHT_CEILING, ADAPTIVE_WEIGHT_FLOOR, COST_MODE_COST_WEIGHT,
    COST_MODE_LATENCY_WEIGHT, COST_MODE_RELIABILITY_WEIGHT, GEO_AFFINITY_BONUS,
    PERF_MODE_COST_WEIGHT, PERF_MODE_LATENCY_WEIGHT, PERF_MODE_RELIABILITY_WEIGHT,
};
use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::value_objects::{
    AccessContext, AdaptationSpeed, Capability, ProviderType, RankedProvider, ResourceKind,
    SelectionMode, SelectionWeights,
};
use std::sync::{Arc, RwLock};
use tracing::debug;

const SCORE_EPSILON: f64 = 1e-9;

/// Ranks providers for the orchestrator
pub struct Selector {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<MetricsStore>,
    circuits: Arc<FailoverStateMachine>,
    quota: Arc<QuotaTracker>,
    permissions: Arc<PermissionEvaluator>,
    adaptive: RwLock<SelectionWeights>,
}

impl Selector {
    /// Create a selector over the shared engines
    pub fn new(
        registry: Arc<ProviderRegistry>,
        metrics: Arc<MetricsStore>,
        circuits: Arc<FailoverStateMachine>,
        quota: Arc<QuotaTracker>,
        permissions: Arc<PermissionEvaluator>,
    ) -> Self {
        Self {
            registry,
            metrics,
            circuits,
            quota,
            permissions,
            adaptive: RwLock::new(
                SelectionWeights {
                    cost: 1.0 / 3.0,
                    latency: 1.0 / 3.0,
                    reliability: 1.0 / 3.0,
                }
            ),
        }
    }

    /// Current adaptive weights
    pub fn adaptive_weights(&self) -> SelectionWeights {
        *self.adaptive.read().expect("weights lock poisoned")
    }

    /// Drift the adaptive weights toward a recommendation
    ///
    /// Each component moves at most `speed.max_delta()` per call, is kept
    /// inside the [floor, ceiling] band, and the result is renormalized.
    pub fn drift_adaptive_weights(&self, target: SelectionWeights, speed: AdaptationSpeed) {
        let target = target.normalized();
        let max_delta = speed.max_delta();
        let mut current = self.adaptive.write().expect("weights lock poisoned");

        let step = |from: f64, to: f64| -> f64 {
            let delta = (to - from).clamp(-max_delta, max_delta);
            (from + delta).clamp(ADAPTIVE_WEIGHT_FLOOR, ADAPTIVE_WEIGHT_CEILING)
        };
        let drifted = SelectionWeights {
            cost: step(current.cost, target.cost),
            latency: step(current.latency, target.latency),
            reliability: step(current.reliability, target.reliability),
        }
        .normalized();

        debug!(
            "Adaptive weights drifted to cost={:.3} latency={:.3} reliability={:.3}",
            drifted.cost, drifted.latency, drifted.reliability
        );
        *current = drifted;
    }

    /// Weights in effect for a selection mode
    pub fn weights_for(&self, mode: SelectionMode) -> SelectionWeights {
        match mode {
            SelectionMode::CostOptimized => SelectionWeights {
                cost: COST_MODE_COST_WEIGHT,
                latency: COST_MODE_LATENCY_WEIGHT,
                reliability: COST_MODE_RELIABILITY_WEIGHT,
            },
            SelectionMode::PerformanceOptimized => SelectionWeights {
                cost: PERF_MODE_COST_WEIGHT,
                latency: PERF_MODE_LATENCY_WEIGHT,
                reliability: PERF_MODE_RELIABILITY_WEIGHT,
            },
            SelectionMode::Adaptive => self.adaptive_weights(),
        }
    }

    /// Rank eligible providers for a capability
    ///
    /// Fails with `NoEligibleProvider` when every capable provider is
    /// excluded. Ties resolve by success rate, then registration order, so
    /// repeated calls with identical state are deterministic.
    pub fn select(
        &self,
        capability: Capability,
        mode: SelectionMode,
        access: &AccessContext,
        region: Option<&str>,
        exclude: &[ProviderType],
    ) -> Result<Vec<RankedProvider>> {
        let capable = self.registry.with_capability(capability);
        if capable.is_empty() {
            return Err(Error::no_eligible_provider(
                capability.to_string(),
                "no registered provider supports the capability",
            ));
        }

        // Quota is plan-level: exhaustion empties the candidate set
        let quota_open = self.quota.check(ResourceKind::Requests).is_ok();

        struct Candidate {
            provider: ProviderType,
            seq: u64,
            latency: f64,
            cost: f64,
            success: f64,
            geo_match: bool,
        }

        let mut candidates = Vec::new();
        for provider in capable {
            if !quota_open
                || exclude.contains(&provider)
                || !self.circuits.state(provider).accepts_traffic()
                || !self.permissions.provider_permitted(provider, access)
            {
                continue;
            }
            let Some(descriptor) = self.registry.descriptor(provider) else {
                continue;
            };
            let snapshot = self.metrics.snapshot(provider);
            candidates.push(Candidate {
                provider,
                seq: descriptor.registration_seq,
                latency: snapshot.latency_p50_ms,
                cost: descriptor.cost.total_per_operation(),
                success: snapshot.success_rate,
                geo_match: region.is_some_and(|r| descriptor.geo.region == r),
            });
        }

        if candidates.is_empty() {
            return Err(Error::no_eligible_provider(
                capability.to_string(),
                "all capable providers are isolated, quota-exhausted, or denied",
            ));
        }

        let weights = self.weights_for(mode);
        let (lat_min, lat_max) = min_max(candidates.iter().map(|c| c.latency));
        let (cost_min, cost_max) = min_max(candidates.iter().map(|c| c.cost));

        let mut scored: Vec<(RankedProvider, u64)> = candidates
            .into_iter()
            .map(|c| {
                let latency_score = normalize_inverted(c.latency, lat_min, lat_max);
                let cost_score = normalize_inverted(c.cost, cost_min, cost_max);
                let mut score = weights.cost * cost_score
                    + weights.latency * latency_score
                    + weights.reliability * c.success;
                if c.geo_match {
                    score += GEO_AFFINITY_BONUS;
                }
                (
                    RankedProvider {
                        provider: c.provider,
                        score,
                        success_rate: c.success,
                    },
                    c.seq,
                )
            })
            .collect();

        scored.sort_by(|(a, seq_a), (b, seq_b)| {
            if (a.score - b.score).abs() > SCORE_EPSILON {
                return b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal);
            }
            if (a.success_rate - b.success_rate).abs() > SCORE_EPSILON {
                return b
                    .success_rate
                    .partial_cmp(&a.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
            seq_a.cmp(seq_b)
        });

        let ranked: Vec<RankedProvider> = scored.into_iter().map(|(r, _)| r).collect();
        debug!(
            "Ranked {} providers for {}: best={}",
            ranked.len(),
            capability,
            ranked[0].provider
        );
        Ok(ranked)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    })
}

/// Map a value into [0, 1] where the smallest observed value scores 1.0
fn normalize_inverted(value: f64, min: f64, max: f64) -> f64 {
    if (max - min).abs() < SCORE_EPSILON {
        return 1.0;
    }
    (max - value) / (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::FailoverConfig;
    use crate::metrics_store::MetricsConfig;
    use async_trait::async_trait;
    use hyperdrive_domain::ports::{InvokeOutcome, ProviderExecutor};
    use hyperdrive_domain::value_objects::{
        CostProfile, DataPermissions, ProviderDescriptor, QuotaPolicy,
    };
    use std::time::Duration;

    struct NullExecutor;

    #[async_trait]
    impl ProviderExecutor for NullExecutor {
        async fn invoke(
            &self,
            _capability: Capability,
            _payload: &serde_json::Value,
            _deadline: Duration,
        ) -> Result<InvokeOutcome> {
            Ok(InvokeOutcome {
                payload: serde_json::Value::Null,
                latency: Duration::from_millis(1),
                cost: 0.0,
            })
        }
    }

    struct Fixture {
        registry: Arc<ProviderRegistry>,
        metrics: Arc<MetricsStore>,
        circuits: Arc<FailoverStateMachine>,
        selector: Selector,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ProviderRegistry::new());
        let metrics = Arc::new(MetricsStore::new(MetricsConfig::default()));
        let circuits = Arc::new(FailoverStateMachine::new(FailoverConfig::default()));
        let quota = Arc::new(QuotaTracker::new(QuotaPolicy::default()).unwrap());
        let permissions = Arc::new(PermissionEvaluator::new(DataPermissions::allow_all()));
        let selector = Selector::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            Arc::clone(&circuits),
            quota,
            permissions,
        );
        Fixture {
            registry,
            metrics,
            circuits,
            selector,
        }
    }

    fn register(
        fixture: &Fixture,
        provider: ProviderType,
        caps: &[Capability],
        cost_per_op: f64,
    ) {
        fixture
            .registry
            .register(
                ProviderDescriptor::new(provider, caps.iter().copied()).with_cost(CostProfile {
                    cost_per_operation: cost_per_op,
                    gas_estimate: 0.0,
                    currency: "USD".to_string(),
                }),
                Arc::new(NullExecutor),
            )
            .unwrap();
    }

    #[test]
    fn isolated_provider_is_excluded_not_penalized() {
        let f = fixture();
        register(&f, ProviderType::Ipfs, &[Capability::Search], 0.0);
        register(&f, ProviderType::MongoDb, &[Capability::Write], 0.0);
        register(&f, ProviderType::Holochain, &[Capability::Search], 0.0);

        // Make the isolated provider look better on raw signals
        for _ in 0..50 {
            f.metrics
                .record_outcome(ProviderType::Holochain, true, Duration::from_millis(1), 0.0);
            f.metrics
                .record_outcome(ProviderType::Ipfs, true, Duration::from_millis(200), 0.0);
        }
        f.circuits.force_isolate(ProviderType::Holochain, "test");

        let ranked = f
            .selector
            .select(
                Capability::Search,
                SelectionMode::PerformanceOptimized,
                &AccessContext::default(),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].provider, ProviderType::Ipfs);
    }

    #[test]
    fn identical_scores_break_ties_by_registration_order() {
        let f = fixture();
        register(&f, ProviderType::MongoDb, &[Capability::Read], 0.1);
        register(&f, ProviderType::Sqlite, &[Capability::Read], 0.1);

        for _ in 0..5 {
            let ranked = f
                .selector
                .select(
                    Capability::Read,
                    SelectionMode::PerformanceOptimized,
                    &AccessContext::default(),
                    None,
                    &[],
                )
                .unwrap();
            assert_eq!(ranked[0].provider, ProviderType::MongoDb);
            assert_eq!(ranked[1].provider, ProviderType::Sqlite);
        }
    }

    #[test]
    fn cost_mode_prefers_the_cheap_provider() {
        let f = fixture();
        register(&f, ProviderType::Ethereum, &[Capability::Write], 2.0);
        register(&f, ProviderType::Ipfs, &[Capability::Write], 0.01);

        let ranked = f
            .selector
            .select(
                Capability::Write,
                SelectionMode::CostOptimized,
                &AccessContext::default(),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(ranked[0].provider, ProviderType::Ipfs);
    }

    #[test]
    fn reliability_separates_providers_under_performance_mode() {
        let f = fixture();
        register(&f, ProviderType::Ipfs, &[Capability::Read], 0.0);
        register(&f, ProviderType::MongoDb, &[Capability::Read], 0.0);

        for _ in 0..50 {
            f.metrics
                .record_outcome(ProviderType::Ipfs, false, Duration::from_millis(10), 0.0);
            f.metrics
                .record_outcome(ProviderType::MongoDb, true, Duration::from_millis(10), 0.0);
        }

        let ranked = f
            .selector
            .select(
                Capability::Read,
                SelectionMode::PerformanceOptimized,
                &AccessContext::default(),
                None,
                &[],
            )
            .unwrap();
        assert_eq!(ranked[0].provider, ProviderType::MongoDb);
    }

    #[test]
    fn empty_candidate_set_is_an_error() {
        let f = fixture();
        register(&f, ProviderType::Ipfs, &[Capability::Read], 0.0);
        let err = f
            .selector
            .select(
                Capability::Nft,
                SelectionMode::PerformanceOptimized,
                &AccessContext::default(),
                None,
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, Error::NoEligibleProvider { .. }));
    }

    #[test]
    fn adaptive_drift_is_bounded_per_cycle() {
        let f = fixture();
        let before = f.selector.adaptive_weights();
        let target = SelectionWeights {
            cost: 0.8,
            latency: 0.1,
            reliability: 0.1,
        };
        f.selector.drift_adaptive_weights(target, AdaptationSpeed::Slow);
        let after = f.selector.adaptive_weights();

        // No component moved more than the slow-speed cap (plus
        // renormalisation noise)
        assert!((after.cost - before.cost).abs() < 0.03);
        assert!(after.cost > before.cost);
        assert!((after.cost + after.latency + after.reliability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn geographic_affinity_adds_bounded_bonus() {
        let f = fixture();
        let mut desc = ProviderDescriptor::new(ProviderType::Ipfs, [Capability::Read]);
        desc.geo.region = "eu-west".to_string();
        f.registry.register(desc, Arc::new(NullExecutor)).unwrap();
        register(&f, ProviderType::MongoDb, &[Capability::Read], 0.0);

        let ranked = f
            .selector
            .select(
                Capability::Read,
                SelectionMode::PerformanceOptimized,
                &AccessContext::default(),
                Some("eu-west"),
                &[],
            )
            .unwrap();
        assert_eq!(ranked[0].provider, ProviderType::Ipfs);
        assert!(ranked[0].score - ranked[1].score <= GEO_AFFINITY_BONUS + 1e-9);
    }
}
