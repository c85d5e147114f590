//! Permission Evaluator
//!
//! Conjunctive evaluation of the layered data-permission policy. An
//! operation is permitted only if every applicable layer permits it; layers
//! whose scope does not match the request are skipped. Provider-scope
//! layers are evaluated separately by the selector, which excludes denied
//! providers before scoring.

use hyperdrive_domain::error::{Error, Result};
use hyperdrive_domain::value_objects::{
    AccessContext, DataPermissions, PermissionLayer, PermissionScope, ProviderType,
};
use std::sync::RwLock;
use tracing::debug;

/// Holds the permission document and evaluates requests against it
pub struct PermissionEvaluator {
    policy: RwLock<DataPermissions>,
}

impl PermissionEvaluator {
    /// Create an evaluator over a permission document
    pub fn new(policy: DataPermissions) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    /// Current permission document
    pub fn policy(&self) -> DataPermissions {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Replace the permission document (full-document PUT semantics)
    pub fn set_policy(&self, policy: DataPermissions) {
        *self.policy.write().expect("policy lock poisoned") = policy;
    }

    /// Check the non-provider layers for an operation
    ///
    /// Returns `PermissionDenied` naming the first layer that rejected.
    pub fn check_operation(&self, data_type: &str, access: &AccessContext) -> Result<()> {
        let policy = self.policy.read().expect("policy lock poisoned");
        if !policy.enabled {
            return Ok(());
        }

        for layer in &policy.layers {
            let applies = match layer.scope {
                PermissionScope::Avatar => layer.selector.is_empty(),
                PermissionScope::Holon | PermissionScope::Field => {
                    layer.selector.is_empty() || layer.selector == data_type
                }
                PermissionScope::Provider => false,
            };
            if !applies {
                continue;
            }
            if let Some(reason) = layer_rejection(layer, access) {
                debug!("Permission denied at {} layer: {}", layer.scope, reason);
                return Err(Error::permission_denied(format!(
                    "{} layer: {reason}",
                    layer.scope
                )));
            }
        }
        Ok(())
    }

    /// Whether provider-scope layers permit routing to a provider
    pub fn provider_permitted(&self, provider: ProviderType, access: &AccessContext) -> bool {
        let policy = self.policy.read().expect("policy lock poisoned");
        if !policy.enabled {
            return true;
        }
        let name = provider.to_string();
        policy
            .layers
            .iter()
            .filter(|layer| {
                layer.scope == PermissionScope::Provider
                    && (layer.selector.is_empty() || layer.selector == name)
            })
            .all(|layer| layer_rejection(layer, access).is_none())
    }
}

fn layer_rejection(layer: &PermissionLayer, access: &AccessContext) -> Option<String> {
    if !layer.allow {
        return Some("denied by policy".to_string());
    }
    if access.authorization < layer.required_authorization {
        return Some(format!(
            "requires authorization {:?}",
            layer.required_authorization
        ));
    }
    if access.encryption < layer.required_encryption {
        return Some(format!("requires encryption {:?}", layer.required_encryption));
    }
    None
}
