//! Provider Registry
//!
//! An explicitly constructed registry of provider executors, passed by
//! reference to the components that need it. There is no hidden singleton;
//! each orchestrator instance owns its own registry, which keeps
//! independent instances unit-testable in isolation.
//!
//! Deregistration removes the provider from the candidate set immediately.
//! Executor handles are reference counted, so calls already in flight keep
//! their executor alive until they complete.

use dashmap::DashMap;
use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::ports::ProviderExecutor;
use hyperdrive_domain::value_objects::{Capability, ProviderDescriptor, ProviderType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// A registered provider: its descriptor plus the executor handle
pub struct RegisteredProvider {
    /// Registration-time description, sequence number assigned
    pub descriptor: ProviderDescriptor,
    /// The adapter executing operations against the backend
    pub executor: Arc<dyn ProviderExecutor>,
}

/// Registry of provider executors keyed by provider type
pub struct ProviderRegistry {
    providers: DashMap<ProviderType, Arc<RegisteredProvider>>,
    next_seq: AtomicU64,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a provider
    ///
    /// Assigns the registration sequence number used for deterministic
    /// selection tie-breaks. Registering an already-present provider type
    /// is an error; deregister it first.
    pub fn register(
        &self,
        mut descriptor: ProviderDescriptor,
        executor: Arc<dyn ProviderExecutor>,
    ) -> Result<()> {
        let provider = descriptor.provider_type;
        descriptor.registration_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let entry = Arc::new(RegisteredProvider {
            descriptor,
            executor,
        });
        // Entry API keeps check-and-insert atomic under concurrent registration
        match self.providers.entry(provider) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::invalid_argument(format!(
                "provider {provider} is already registered"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                info!("Registered provider {}", provider);
                Ok(())
            }
        }
    }

    /// Remove a provider from the candidate set
    ///
    /// In-flight calls holding the executor Arc are unaffected; the
    /// executor is dropped when the last handle goes away.
    pub fn deregister(&self, provider: ProviderType) -> Result<()> {
        self.providers
            .remove(&provider)
            .map(|_| info!("Deregistered provider {}", provider))
            .ok_or_else(|| Error::not_found(format!("provider {provider}")))
    }

    /// Get the registered entry for a provider
    pub fn get(&self, provider: ProviderType) -> Result<Arc<RegisteredProvider>> {
        self.providers
            .get(&provider)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| Error::not_found(format!("provider {provider}")))
    }

    /// Get a provider's descriptor, if registered
    pub fn descriptor(&self, provider: ProviderType) -> Option<ProviderDescriptor> {
        self.providers
            .get(&provider)
            .map(|entry| entry.descriptor.clone())
    }

    /// All registered providers in registration order
    pub fn list(&self) -> Vec<ProviderType> {
        let mut entries: Vec<(u64, ProviderType)> = self
            .providers
            .iter()
            .map(|entry| (entry.descriptor.registration_seq, *entry.key()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, provider)| provider).collect()
    }

    /// Enabled providers supporting a capability, in registration order
    pub fn with_capability(&self, capability: Capability) -> Vec<ProviderType> {
        let mut entries: Vec<(u64, ProviderType)> = self
            .providers
            .iter()
            .filter(|entry| entry.descriptor.enabled && entry.descriptor.supports(capability))
            .map(|entry| (entry.descriptor.registration_seq, *entry.key()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, provider)| provider).collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hyperdrive_domain::ports::InvokeOutcome;
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

    fn register(registry: &ProviderRegistry, provider: ProviderType, caps: &[Capability]) {
        registry
            .register(
                ProviderDescriptor::new(provider, caps.iter().copied()),
                Arc::new(NullExecutor),
            )
            .unwrap();
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = ProviderRegistry::new();
        register(&registry, ProviderType::MongoDb, &[Capability::Read]);
        register(&registry, ProviderType::Ipfs, &[Capability::Read]);
        register(&registry, ProviderType::Sqlite, &[Capability::Read]);

        assert_eq!(
            registry.list(),
            vec![ProviderType::MongoDb, ProviderType::Ipfs, ProviderType::Sqlite]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ProviderRegistry::new();
        register(&registry, ProviderType::Ipfs, &[Capability::Read]);
        let err = registry
            .register(
                ProviderDescriptor::new(ProviderType::Ipfs, [Capability::Read]),
                Arc::new(NullExecutor),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn capability_filter_respects_enabled_flag() {
        let registry = ProviderRegistry::new();
        register(&registry, ProviderType::Ipfs, &[Capability::Read, Capability::Write]);
        let mut desc = ProviderDescriptor::new(ProviderType::MongoDb, [Capability::Write]);
        desc.enabled = false;
        registry.register(desc, Arc::new(NullExecutor)).unwrap();

        assert_eq!(registry.with_capability(Capability::Write), vec![ProviderType::Ipfs]);
    }

    #[test]
    fn deregistered_provider_leaves_candidate_set() {
        let registry = ProviderRegistry::new();
        register(&registry, ProviderType::Ipfs, &[Capability::Read]);
        let held = registry.get(ProviderType::Ipfs).unwrap();

        registry.deregister(ProviderType::Ipfs).unwrap();
        assert!(registry.get(ProviderType::Ipfs).is_err());
        assert!(registry.list().is_empty());

        // The held handle stays usable for the in-flight call
        assert_eq!(held.descriptor.provider_type, ProviderType::Ipfs);
    }
}
