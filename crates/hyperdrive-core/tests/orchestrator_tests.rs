//! Orchestrator integration tests
//!
//! Exercises the façade end to end against mock executors: gating,
//! fallback retry, replication quorum, cancellation, and probe-driven
//! recovery.

use async_trait::async_trait;
use hyperdrive_core::config::EngineConfig;
use hyperdrive_core::failover::FailoverConfig;
use hyperdrive_core::orchestrator::Orchestrator;
use hyperdrive_core::registry::ProviderRegistry;
use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::ports::{InvokeOutcome, ProviderExecutor};
use hyperdrive_domain::value_objects::{
    AccessContext, AuthorizationLevel, Capability, CircuitState, DataPermissions, EncryptionLevel,
    EscalationLevel, EscalationRule, FailoverCondition, FailoverRules, FailoverTrigger,
    OperationRequest, PermissionLayer, PermissionScope, ProviderDescriptor, ProviderType,
    QuotaPolicy, ReplicationRules, ResourceKind, SyncPolicy,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted executor that counts its invocations
struct MockExecutor {
    calls: AtomicU32,
    fail: bool,
    hang: bool,
    latency: Duration,
}

impl MockExecutor {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: false,
            hang: false,
            latency: Duration::from_millis(1),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: true,
            hang: false,
            latency: Duration::from_millis(1),
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: false,
            hang: true,
            latency: Duration::from_millis(1),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderExecutor for MockExecutor {
    async fn invoke(
        &self,
        _capability: Capability,
        payload: &serde_json::Value,
        _deadline: Duration,
    ) -> Result<InvokeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        tokio::time::sleep(self.latency).await;
        if self.fail {
            return Err(Error::provider_error("mock", "scripted failure"));
        }
        Ok(InvokeOutcome {
            payload: payload.clone(),
            latency: self.latency,
            cost: 0.01,
        })
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        failover: FailoverConfig {
            probe_success_threshold: 3,
            audit_capacity: 64,
            default_cooldown_secs: 1,
        },
        ..Default::default()
    }
}

fn register(
    registry: &ProviderRegistry,
    provider: ProviderType,
    caps: &[Capability],
    executor: Arc<MockExecutor>,
) {
    registry
        .register(
            ProviderDescriptor::new(provider, caps.iter().copied()),
            executor,
        )
        .unwrap();
}

#[tokio::test]
async fn denied_request_never_reaches_an_executor() {
    let registry = Arc::new(ProviderRegistry::new());
    let executor = MockExecutor::succeeding();
    register(&registry, ProviderType::Ipfs, &[Capability::Write], Arc::clone(&executor));

    let permissions = DataPermissions {
        enabled: true,
        layers: vec![PermissionLayer {
            scope: PermissionScope::Holon,
            selector: "wallet".to_string(),
            allow: true,
            required_authorization: AuthorizationLevel::Owner,
            required_encryption: EncryptionLevel::None,
        }],
    };
    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        permissions,
    )
    .unwrap();

    let request =
        OperationRequest::new(Capability::Write, json!({"k": "v"})).with_data_type("wallet");
    let err = orchestrator.execute(request).await.unwrap_err();

    assert!(matches!(err, Error::PermissionDenied { .. }));
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn authorized_caller_passes_the_same_layer() {
    let registry = Arc::new(ProviderRegistry::new());
    register(&registry, ProviderType::Ipfs, &[Capability::Write], MockExecutor::succeeding());

    let permissions = DataPermissions {
        enabled: true,
        layers: vec![PermissionLayer {
            scope: PermissionScope::Holon,
            selector: "wallet".to_string(),
            allow: true,
            required_authorization: AuthorizationLevel::Owner,
            required_encryption: EncryptionLevel::None,
        }],
    };
    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        permissions,
    )
    .unwrap();

    let request = OperationRequest::new(Capability::Write, json!({"k": "v"}))
        .with_data_type("wallet")
        .with_access(AccessContext {
            authorization: AuthorizationLevel::Owner,
            encryption: EncryptionLevel::None,
        });
    let result = orchestrator.execute(request).await.unwrap();
    assert_eq!(result.served_by, ProviderType::Ipfs);
}

#[tokio::test]
async fn quota_exhaustion_is_terminal_and_consumes_no_attempt() {
    let registry = Arc::new(ProviderRegistry::new());
    let executor = MockExecutor::succeeding();
    register(&registry, ProviderType::Ipfs, &[Capability::Read], Arc::clone(&executor));

    let mut quota = QuotaPolicy::default();
    quota.limits.insert(ResourceKind::Requests, 1);
    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        quota,
        DataPermissions::allow_all(),
    )
    .unwrap();

    let request = OperationRequest::new(Capability::Read, json!(null));
    orchestrator.execute(request.clone()).await.unwrap();

    let err = orchestrator.execute(request).await.unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn failed_primary_falls_back_to_next_ranked_candidate() {
    let registry = Arc::new(ProviderRegistry::new());
    let failing = MockExecutor::failing();
    let succeeding = MockExecutor::succeeding();
    register(&registry, ProviderType::Ipfs, &[Capability::Read], Arc::clone(&failing));
    register(&registry, ProviderType::MongoDb, &[Capability::Read], Arc::clone(&succeeding));

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();

    let result = orchestrator
        .execute(OperationRequest::new(Capability::Read, json!(null)))
        .await
        .unwrap();

    assert_eq!(result.served_by, ProviderType::MongoDb);
    assert_eq!(result.attempts, 2);
    assert_eq!(failing.calls(), 1);
    assert_eq!(succeeding.calls(), 1);

    // The failure was recorded even though the caller saw a success
    let snapshot = orchestrator.metrics_store().snapshot(ProviderType::Ipfs);
    assert_eq!(snapshot.failed_requests, 1);
}

#[tokio::test]
async fn exhausted_candidates_surface_the_last_provider_error() {
    let registry = Arc::new(ProviderRegistry::new());
    register(&registry, ProviderType::Ipfs, &[Capability::Read], MockExecutor::failing());
    register(&registry, ProviderType::MongoDb, &[Capability::Read], MockExecutor::failing());

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();

    let err = orchestrator
        .execute(OperationRequest::new(Capability::Read, json!(null)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderError { .. }));
}

#[tokio::test]
async fn quorum_two_of_three_is_a_degraded_success_naming_the_failure() {
    let registry = Arc::new(ProviderRegistry::new());
    let primary = MockExecutor::succeeding();
    let good_replica = MockExecutor::succeeding();
    let bad_replica = MockExecutor::failing();
    register(&registry, ProviderType::Ipfs, &[Capability::Write], Arc::clone(&primary));
    register(&registry, ProviderType::MongoDb, &[Capability::Write], Arc::clone(&good_replica));
    register(&registry, ProviderType::Holochain, &[Capability::Write], Arc::clone(&bad_replica));

    let replication = ReplicationRules::new(
        3,
        vec![ProviderType::Ipfs, ProviderType::MongoDb, ProviderType::Holochain],
        SyncPolicy::Quorum { count: 2 },
        vec![],
    )
    .unwrap();

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        replication,
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();

    let result = orchestrator
        .execute(OperationRequest::new(Capability::Write, json!({"doc": 1})))
        .await
        .unwrap();

    assert!(result.degraded);
    let report = result.replication.unwrap();
    assert_eq!(report.requested, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed_targets(), vec![ProviderType::Holochain]);
}

#[tokio::test]
async fn capability_on_isolated_provider_routes_to_the_healthy_one() {
    // A healthy, B healthy, C isolated; capability present only on A and C
    let registry = Arc::new(ProviderRegistry::new());
    register(&registry, ProviderType::Ipfs, &[Capability::Search, Capability::Read], MockExecutor::succeeding());
    register(&registry, ProviderType::MongoDb, &[Capability::Read], MockExecutor::succeeding());
    register(&registry, ProviderType::Holochain, &[Capability::Search, Capability::Read], MockExecutor::succeeding());

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();
    orchestrator
        .circuits()
        .force_isolate(ProviderType::Holochain, "test");

    let ranked = orchestrator.rank(Capability::Search, None).unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].provider, ProviderType::Ipfs);

    let result = orchestrator
        .execute(OperationRequest::new(Capability::Search, json!(null)))
        .await
        .unwrap();
    assert_eq!(result.served_by, ProviderType::Ipfs);
}

#[tokio::test]
async fn cancellation_reports_cancelled_without_retrying() {
    let registry = Arc::new(ProviderRegistry::new());
    let hanging = MockExecutor::hanging();
    let fallback = MockExecutor::succeeding();
    register(&registry, ProviderType::Ipfs, &[Capability::Read], Arc::clone(&hanging));
    register(&registry, ProviderType::MongoDb, &[Capability::Read], Arc::clone(&fallback));

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = orchestrator
        .execute_with_cancellation(OperationRequest::new(Capability::Read, json!(null)), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    // The fallback was never tried: cancellation does not retry
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn consecutive_failures_degrade_then_probes_recover_the_circuit() {
    let registry = Arc::new(ProviderRegistry::new());
    register(&registry, ProviderType::Ipfs, &[Capability::Read], MockExecutor::failing());

    let failover = FailoverRules::new(vec![FailoverTrigger {
        id: "streak".to_string(),
        name: "consecutive failures".to_string(),
        condition: FailoverCondition::ConsecutiveFailures { count: 2 },
        escalation: EscalationRule {
            level: EscalationLevel::Critical,
            fallback_providers: vec![],
            cooldown_secs: 1,
        },
        enabled: true,
    }])
    .unwrap();

    let orchestrator = Arc::new(
        Orchestrator::with_documents(
            Arc::clone(&registry),
            engine_config(),
            ReplicationRules::default(),
            failover,
            QuotaPolicy::default(),
            DataPermissions::allow_all(),
        )
        .unwrap(),
    );

    // Two failing calls trip the consecutive-failures trigger (Critical
    // isolates immediately)
    for _ in 0..2 {
        let _ = orchestrator
            .execute(OperationRequest::new(Capability::Read, json!(null)))
            .await;
    }
    assert_eq!(
        orchestrator.circuits().state(ProviderType::Ipfs),
        CircuitState::Isolated
    );

    // Cool-down elapses; the circuit moves to Recovering and the selector
    // keeps it out of rotation
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(
        orchestrator.circuits().state(ProviderType::Ipfs),
        CircuitState::Recovering
    );
    assert!(orchestrator.rank(Capability::Read, None).is_err());

    // Swap in a working executor by re-registering, then let probes promote
    registry.deregister(ProviderType::Ipfs).unwrap();
    register(&registry, ProviderType::Ipfs, &[Capability::Read], MockExecutor::succeeding());
    for _ in 0..3 {
        orchestrator.run_probe_cycle().await;
    }
    assert_eq!(
        orchestrator.circuits().state(ProviderType::Ipfs),
        CircuitState::Healthy
    );
}

#[tokio::test]
async fn preventive_failover_touches_only_the_opt_in_list() {
    let registry = Arc::new(ProviderRegistry::new());
    register(&registry, ProviderType::Ipfs, &[Capability::Read], MockExecutor::succeeding());
    register(&registry, ProviderType::MongoDb, &[Capability::Read], MockExecutor::succeeding());

    let orchestrator = Orchestrator::with_documents(
        registry,
        engine_config(),
        ReplicationRules::default(),
        FailoverRules::default(),
        QuotaPolicy::default(),
        DataPermissions::allow_all(),
    )
    .unwrap();

    let isolated = orchestrator.preventive_failover(&[ProviderType::Ipfs]);
    assert_eq!(isolated, 1);
    assert_eq!(
        orchestrator.circuits().state(ProviderType::Ipfs),
        CircuitState::Isolated
    );
    assert_eq!(
        orchestrator.circuits().state(ProviderType::MongoDb),
        CircuitState::Healthy
    );
}
