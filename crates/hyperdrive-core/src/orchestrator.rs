//! Orchestrator Façade
//!
//! The single entry point: given an operation request, consults the
//! selector, dispatches to the chosen provider executor(s) per the
//! replication rules, records outcomes, and applies failover transitions.
//!
//! Permission and quota failures are terminal and never consume a provider
//! attempt. Provider-level failures are retried transparently against the
//! next-ranked candidate up to the configured attempt limit. Every outcome
//! is recorded into the metrics store and analytics engine before the
//! caller sees a result, so failover and analytics state reflect reality
//! even when the caller-visible result is a success via fallback.

use crate::analytics::AnalyticsEngine;
use crate::config::{EngineConfig, OrchestratorConfig};
use crate::failover::FailoverStateMachine;
use crate::metrics_store::MetricsStore;
use crate::permissions::PermissionEvaluator;
use crate::quota::QuotaTracker;
use crate::registry::ProviderRegistry;
use crate::rule_engine::{FailoverInputs, ReplicationDecision, RuleEngine};
use crate::selector::Selector;
use chrono::Utc;
use futures::future::join_all;
use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::ports::{InvokeOutcome, ProviderExecutor};
use hyperdrive_domain::value_objects::{
    AnalyticsDataPoint, Capability, CircuitState, DataPermissions, FailoverRules, FailureEvent,
    FailureType, OperationRequest, OperationResult, ProviderType, QuotaPolicy, RankedProvider,
    ReplicaOutcome, ReplicationReport, ReplicationRules, ResourceKind, SelectionMode, SyncPolicy,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Handles for the background loops; aborted when dropped
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// The orchestration façade owning the engines and the provider registry
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<MetricsStore>,
    rules: Arc<RuleEngine>,
    circuits: Arc<FailoverStateMachine>,
    analytics: Arc<AnalyticsEngine>,
    quota: Arc<QuotaTracker>,
    permissions: Arc<PermissionEvaluator>,
    selector: Selector,
    config: OrchestratorConfig,
    mode: RwLock<SelectionMode>,
    adaptive_enabled: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator with default rule/policy documents
    pub fn new(registry: Arc<ProviderRegistry>, engine: EngineConfig) -> Result<Self> {
        Self::with_documents(
            registry,
            engine,
            ReplicationRules::default(),
            FailoverRules::default(),
            QuotaPolicy::default(),
            DataPermissions::allow_all(),
        )
    }

    /// Create an orchestrator with explicit rule and policy documents
    pub fn with_documents(
        registry: Arc<ProviderRegistry>,
        engine: EngineConfig,
        replication: ReplicationRules,
        failover: FailoverRules,
        quota: QuotaPolicy,
        permissions: DataPermissions,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsStore::new(engine.metrics.clone()));
        let rules = Arc::new(RuleEngine::new(replication, failover)?);
        let circuits = Arc::new(FailoverStateMachine::new(engine.failover.clone()));
        let analytics = Arc::new(AnalyticsEngine::new(engine.analytics.clone()));
        let quota = Arc::new(QuotaTracker::new(quota)?);
        let permissions = Arc::new(PermissionEvaluator::new(permissions));
        let selector = Selector::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            Arc::clone(&circuits),
            Arc::clone(&quota),
            Arc::clone(&permissions),
        );
        let config = engine.orchestrator.clone();

        Ok(Self {
            registry,
            metrics,
            rules,
            circuits,
            analytics,
            quota,
            permissions,
            selector,
            mode: RwLock::new(config.selection_mode),
            adaptive_enabled: AtomicBool::new(config.adaptive_enabled),
            config,
        })
    }

    /// Execute an operation without external cancellation
    pub async fn execute(&self, request: OperationRequest) -> Result<OperationResult> {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Execute an operation, honouring a caller-supplied cancellation token
    #[instrument(skip(self, request, cancel), fields(capability = %request.capability))]
    pub async fn execute_with_cancellation(
        &self,
        request: OperationRequest,
        cancel: CancellationToken,
    ) -> Result<OperationResult> {
        // Step 1: gates. Terminal failures, no provider attempt consumed.
        self.permissions
            .check_operation(&request.data_type, &request.access)?;
        self.quota.check(ResourceKind::Requests)?;

        // Step 2: replication decision
        let cost_estimate = self.cheapest_capable_cost(request.capability);
        let decision =
            self.rules
                .evaluate_replication(request.capability, &request.data_type, cost_estimate);

        // Step 3: ranked candidates, restricted to the replication target
        // set when one applies
        let ranked = self.selector.select(
            request.capability,
            self.selection_mode(),
            &request.access,
            request.region.as_deref(),
            &request.exclude,
        )?;
        let candidates = restrict_to_targets(&ranked, &decision);

        self.quota.consume(ResourceKind::Requests, 1);

        // Step 4: primary dispatch with transparent fallback
        let mut attempts: u32 = 0;
        let mut last_error: Option<Error> = None;
        let mut primary: Option<(ProviderType, InvokeOutcome)> = None;

        for provider in candidates.iter().take(self.config.max_attempts as usize) {
            attempts += 1;
            match self.dispatch(*provider, request.capability, &request.payload, &cancel).await {
                Ok(outcome) => {
                    self.record_success(*provider, &request, &outcome);
                    if attempts > 1 {
                        info!(
                            "Operation served by fallback {} after {} attempts",
                            provider, attempts
                        );
                        self.quota.consume(ResourceKind::Failovers, 1);
                    }
                    primary = Some((*provider, outcome));
                    break;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    warn!("Dispatch to {} failed: {}", provider, err);
                    self.record_failure(*provider, &request, &err);
                    last_error = Some(err);
                }
            }
        }

        let Some((served_by, outcome)) = primary else {
            return Err(last_error.unwrap_or_else(|| {
                Error::no_eligible_provider(
                    request.capability.to_string(),
                    "all ranked candidates failed",
                )
            }));
        };

        // Step 5: replication fan-out for writes
        let replication = if request.capability == Capability::Write && decision.replicates() {
            Some(self.fan_out(served_by, &decision, &request).await)
        } else {
            None
        };
        let degraded = replication
            .as_ref()
            .is_some_and(|report| report.outcomes.iter().any(|o| !o.success));

        // Step 6: outcomes were recorded along the way; assemble the result
        Ok(OperationResult {
            served_by,
            payload: outcome.payload,
            attempts,
            latency_ms: outcome.latency.as_secs_f64() * 1_000.0,
            cost: outcome.cost,
            replication,
            degraded,
        })
    }

    /// One dispatch against one provider with timeout and cancellation
    async fn dispatch(
        &self,
        provider: ProviderType,
        capability: Capability,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<InvokeOutcome> {
        let entry = self.registry.get(provider)?;
        let timeout = Duration::from_millis(self.config.dispatch_timeout_ms);

        self.metrics.record_connection(provider, 1);
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            invoked = tokio::time::timeout(timeout, entry.executor.invoke(capability, payload, timeout)) => {
                match invoked {
                    Ok(inner) => inner,
                    Err(_) => Err(Error::provider_timeout(
                        provider.to_string(),
                        timeout.as_millis() as u64,
                    )),
                }
            }
        };
        self.metrics.record_connection(provider, -1);
        result
    }

    /// Fan out a successful write to the remaining targets
    async fn fan_out(
        &self,
        primary: ProviderType,
        decision: &ReplicationDecision,
        request: &OperationRequest,
    ) -> ReplicationReport {
        let secondaries: Vec<ProviderType> = decision
            .targets
            .iter()
            .copied()
            .filter(|p| *p != primary)
            .filter(|p| self.circuits.state(*p).accepts_traffic())
            .filter(|p| {
                self.registry
                    .descriptor(*p)
                    .is_some_and(|d| d.supports(Capability::Write))
            })
            .take(decision.replica_count.saturating_sub(1) as usize)
            .collect();

        let requested = secondaries.len() as u32;
        if secondaries.is_empty() {
            return ReplicationReport::default();
        }

        let timeout = Duration::from_millis(self.config.dispatch_timeout_ms);
        match decision.sync {
            SyncPolicy::Quorum { count } => {
                // The caller waits; the primary already counts toward quorum
                let futures: Vec<_> = secondaries
                    .iter()
                    .map(|p| {
                        replicate_to(
                            Arc::clone(&self.registry),
                            Arc::clone(&self.metrics),
                            Arc::clone(&self.analytics),
                            *p,
                            request.payload.clone(),
                            timeout,
                        )
                    })
                    .collect();
                let outcomes = join_all(futures).await;
                self.quota
                    .consume(ResourceKind::Replications, outcomes.len() as u64);

                let succeeded = outcomes.iter().filter(|o| o.success).count() as u32;
                if succeeded + 1 < count {
                    warn!(
                        "Replication quorum missed: {} of {} writes (quorum {})",
                        succeeded + 1,
                        requested + 1,
                        count
                    );
                }
                ReplicationReport {
                    requested,
                    succeeded,
                    outcomes,
                }
            }
            SyncPolicy::BestEffort => {
                // Fire-and-forget with recorded outcome
                for provider in secondaries {
                    let registry = Arc::clone(&self.registry);
                    let metrics = Arc::clone(&self.metrics);
                    let analytics = Arc::clone(&self.analytics);
                    let payload = request.payload.clone();
                    tokio::spawn(async move {
                        let _ =
                            replicate_to(registry, metrics, analytics, provider, payload, timeout)
                                .await;
                    });
                }
                self.quota
                    .consume(ResourceKind::Replications, u64::from(requested));
                ReplicationReport {
                    requested,
                    succeeded: 0,
                    outcomes: Vec::new(),
                }
            }
        }
    }

    fn cheapest_capable_cost(&self, capability: Capability) -> f64 {
        self.registry
            .with_capability(capability)
            .into_iter()
            .filter_map(|p| self.registry.descriptor(p))
            .map(|d| d.cost.total_per_operation())
            .fold(f64::INFINITY, f64::min)
            .min(f64::MAX)
    }

    fn record_success(&self, provider: ProviderType, request: &OperationRequest, outcome: &InvokeOutcome) {
        self.metrics
            .record_outcome(provider, true, outcome.latency, outcome.cost);
        self.analytics.record(AnalyticsDataPoint {
            timestamp: Utc::now(),
            provider,
            success: true,
            latency_ms: outcome.latency.as_secs_f64() * 1_000.0,
            cost: outcome.cost,
            region: request.region.clone().unwrap_or_default(),
            operation: request.capability.to_string(),
        });
    }

    fn record_failure(&self, provider: ProviderType, request: &OperationRequest, error: &Error) {
        let (latency, failure_type) = match error {
            Error::ProviderTimeout { timeout_ms, .. } => (
                Duration::from_millis(*timeout_ms),
                FailureType::Timeout,
            ),
            _ => (Duration::ZERO, FailureType::Other),
        };
        self.metrics.record_outcome(provider, false, latency, 0.0);
        self.analytics.record(AnalyticsDataPoint {
            timestamp: Utc::now(),
            provider,
            success: false,
            latency_ms: latency.as_secs_f64() * 1_000.0,
            cost: 0.0,
            region: request.region.clone().unwrap_or_default(),
            operation: request.capability.to_string(),
        });
        self.analytics.record_failure(FailureEvent {
            timestamp: Utc::now(),
            provider,
            failure_type,
            description: error.to_string(),
        });
        self.react_to_failure(provider);
    }

    /// Let the state machine react to a live failure through the rules
    fn react_to_failure(&self, provider: ProviderType) {
        if self.circuits.is_suppressed(provider) {
            return;
        }
        let inputs = FailoverInputs {
            snapshot: self.metrics.snapshot(provider),
            consecutive_failures: self.metrics.consecutive_failures(provider),
            predicted_risk: self.analytics.failure_probability(provider),
        };
        if let Some(action) = self.rules.evaluate_failover(provider, &inputs) {
            self.circuits.apply(provider, &action);
        }
    }

    // ------------------------------------------------------------------
    // Background loops
    // ------------------------------------------------------------------

    /// Spawn the periodic loops: failover evaluation + weight adaptation,
    /// and probe traffic for Recovering providers
    ///
    /// The loops never hold a hot-path lock beyond the snapshot/update
    /// operations the engines already do.
    pub fn spawn_background_loops(self: &Arc<Self>) -> BackgroundTasks {
        let mut handles = Vec::new();

        let orchestrator = Arc::clone(self);
        let evaluation_interval = self.config.evaluation_interval_secs.max(1);
        handles.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(evaluation_interval));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                orchestrator.run_failover_evaluation();
                orchestrator.run_adaptation_cycle();
            }
        }));

        let orchestrator = Arc::clone(self);
        let probe_interval = self.config.probe_interval_secs.max(1);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(probe_interval));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                orchestrator.run_probe_cycle().await;
            }
        }));

        BackgroundTasks { handles }
    }

    /// One failover evaluation pass over every registered provider
    pub fn run_failover_evaluation(&self) {
        for provider in self.registry.list() {
            if self.circuits.is_suppressed(provider) {
                continue;
            }
            let inputs = FailoverInputs {
                snapshot: self.metrics.snapshot(provider),
                consecutive_failures: self.metrics.consecutive_failures(provider),
                predicted_risk: self.analytics.failure_probability(provider),
            };
            if let Some(action) = self.rules.evaluate_failover(provider, &inputs) {
                if self.circuits.apply(provider, &action) {
                    self.quota.consume(ResourceKind::Failovers, 1);
                }
            }
        }
    }

    /// One adaptation pass: drift the adaptive weights toward the
    /// analytics recommendation
    pub fn run_adaptation_cycle(&self) {
        if !self.adaptive_enabled.load(Ordering::Relaxed) {
            return;
        }
        let target = self.analytics.recommended_weights();
        self.selector
            .drift_adaptive_weights(target, self.config.adaptation_speed);
    }

    /// Probe every Recovering provider with a lightweight read
    pub async fn run_probe_cycle(&self) {
        for provider in self.circuits.recovering_providers() {
            let Ok(entry) = self.registry.get(provider) else {
                continue;
            };
            let timeout = Duration::from_millis(self.config.dispatch_timeout_ms);
            let started = Instant::now();
            let invoked =
                tokio::time::timeout(timeout, entry.executor.invoke(Capability::Read, &Value::Null, timeout))
                    .await;
            let success = matches!(invoked, Ok(Ok(_)));
            let latency = started.elapsed();

            debug!("Probe of {}: success={}", provider, success);
            self.metrics.record_outcome(provider, success, latency, 0.0);
            self.analytics.record(AnalyticsDataPoint {
                timestamp: Utc::now(),
                provider,
                success,
                latency_ms: latency.as_secs_f64() * 1_000.0,
                cost: 0.0,
                region: String::new(),
                operation: "probe".to_string(),
            });
            self.circuits.record_probe(provider, success);
        }
    }

    /// Isolate high-risk providers ahead of a predicted failure
    ///
    /// Only the explicitly supplied opt-in list is touched. Returns how
    /// many providers were actually isolated.
    pub fn preventive_failover(&self, providers: &[ProviderType]) -> usize {
        let mut isolated = 0;
        for provider in providers {
            if !self.circuits.state(*provider).accepts_traffic() {
                continue;
            }
            let probability = self.analytics.failure_probability(*provider);
            self.circuits
                .force_isolate(*provider, &format!("predicted_risk={probability:.3}"));
            self.quota.consume(ResourceKind::Failovers, 1);
            isolated += 1;
        }
        isolated
    }

    // ------------------------------------------------------------------
    // Configuration and observability accessors
    // ------------------------------------------------------------------

    /// Current selection mode
    pub fn selection_mode(&self) -> SelectionMode {
        *self.mode.read().expect("mode lock poisoned")
    }

    /// Switch the selection mode
    pub fn set_selection_mode(&self, mode: SelectionMode) {
        *self.mode.write().expect("mode lock poisoned") = mode;
        info!("Selection mode set to {:?}", mode);
    }

    /// Whether the adaptive feedback loop is running
    pub fn adaptive_enabled(&self) -> bool {
        self.adaptive_enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable the adaptive feedback loop
    pub fn set_adaptive_enabled(&self, enabled: bool) {
        self.adaptive_enabled.store(enabled, Ordering::Relaxed);
        info!("Adaptive mode {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Preview the current ranking for a capability
    pub fn rank(
        &self,
        capability: Capability,
        mode: Option<SelectionMode>,
    ) -> Result<Vec<RankedProvider>> {
        self.selector.select(
            capability,
            mode.unwrap_or_else(|| self.selection_mode()),
            &Default::default(),
            None,
            &[],
        )
    }

    /// Providers currently accepting general traffic
    pub fn active_providers(&self) -> Vec<ProviderType> {
        self.registry
            .list()
            .into_iter()
            .filter(|p| self.circuits.state(*p).accepts_traffic())
            .collect()
    }

    /// Circuit states for all registered providers
    pub fn circuit_states(&self) -> Vec<(ProviderType, CircuitState)> {
        self.registry
            .list()
            .into_iter()
            .map(|p| (p, self.circuits.state(p)))
            .collect()
    }

    /// The provider registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The metrics store
    pub fn metrics_store(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    /// The rule engine
    pub fn rule_engine(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// The failover state machine
    pub fn circuits(&self) -> &Arc<FailoverStateMachine> {
        &self.circuits
    }

    /// The analytics engine
    pub fn analytics(&self) -> &Arc<AnalyticsEngine> {
        &self.analytics
    }

    /// The quota tracker
    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// The permission evaluator
    pub fn permissions(&self) -> &Arc<PermissionEvaluator> {
        &self.permissions
    }
}

/// Restrict the ranked list to the replication target set, falling back to
/// the full ranking when the intersection is empty (the fan-out still
/// reaches the targets; the primary must land somewhere)
fn restrict_to_targets(
    ranked: &[RankedProvider],
    decision: &ReplicationDecision,
) -> Vec<ProviderType> {
    if decision.targets.is_empty() {
        return ranked.iter().map(|r| r.provider).collect();
    }
    let restricted: Vec<ProviderType> = ranked
        .iter()
        .filter(|r| decision.targets.contains(&r.provider))
        .map(|r| r.provider)
        .collect();
    if restricted.is_empty() {
        ranked.iter().map(|r| r.provider).collect()
    } else {
        restricted
    }
}

/// One replica write with its own timeout, outcome recorded
async fn replicate_to(
    registry: Arc<ProviderRegistry>,
    metrics: Arc<MetricsStore>,
    analytics: Arc<AnalyticsEngine>,
    provider: ProviderType,
    payload: Value,
    timeout: Duration,
) -> ReplicaOutcome {
    let entry = match registry.get(provider) {
        Ok(entry) => entry,
        Err(err) => {
            return ReplicaOutcome {
                provider,
                success: false,
                error: Some(err.to_string()),
            };
        }
    };

    let started = Instant::now();
    let invoked =
        tokio::time::timeout(timeout, invoke_write(&entry.executor, &payload, timeout)).await;
    let latency = started.elapsed();

    let (success, cost, error) = match invoked {
        Ok(Ok(outcome)) => (true, outcome.cost, None),
        Ok(Err(err)) => (false, 0.0, Some(err.to_string())),
        Err(_) => (
            false,
            0.0,
            Some(format!("replica write timed out after {}ms", timeout.as_millis())),
        ),
    };

    metrics.record_outcome(provider, success, latency, cost);
    analytics.record(AnalyticsDataPoint {
        timestamp: Utc::now(),
        provider,
        success,
        latency_ms: latency.as_secs_f64() * 1_000.0,
        cost,
        region: String::new(),
        operation: "replicate".to_string(),
    });

    ReplicaOutcome {
        provider,
        success,
        error,
    }
}

async fn invoke_write(
    executor: &Arc<dyn ProviderExecutor>,
    payload: &Value,
    deadline: Duration,
) -> Result<InvokeOutcome> {
    executor.invoke(Capability::Write, payload, deadline).await
}
