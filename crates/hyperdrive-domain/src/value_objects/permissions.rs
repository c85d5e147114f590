//! Data Permission Value Objects
//!
//! Layered allow/deny policy. Evaluation is conjunctive: an operation is
//! permitted only if every applicable layer permits it. Layers that do not
//! apply to a request (no matching scope) are skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authorization required by a permission layer, ordered weakest to
/// strongest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationLevel {
    /// No authentication required
    #[default]
    Public,
    /// Any authenticated caller
    Authenticated,
    /// Caller authorized for the resource
    Authorized,
    /// Administrative caller
    Admin,
    /// Resource owner only
    Owner,
}

/// Encryption strength required by a permission layer, ordered weakest to
/// strongest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionLevel {
    /// Plaintext acceptable
    #[default]
    None,
    /// Transport-level encryption
    Basic,
    /// At-rest encryption
    Standard,
    /// At-rest with managed keys
    High,
    /// Hardware-backed keys
    Military,
}

/// Which scope a permission layer guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// Avatar-level policy
    Avatar,
    /// Holon-level policy
    Holon,
    /// Provider-level policy
    Provider,
    /// Field-level policy
    Field,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionScope::Avatar => "avatar",
            PermissionScope::Holon => "holon",
            PermissionScope::Provider => "provider",
            PermissionScope::Field => "field",
        };
        write!(f, "{name}")
    }
}

/// One layer of the conjunctive policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionLayer {
    /// The scope this layer guards
    pub scope: PermissionScope,
    /// Selector within the scope: data type for Holon/Field layers,
    /// provider name for Provider layers, empty for a catch-all
    #[serde(default)]
    pub selector: String,
    /// Deny short-circuits evaluation regardless of levels
    pub allow: bool,
    /// Minimum authorization the request must carry
    #[serde(default)]
    pub required_authorization: AuthorizationLevel,
    /// Minimum encryption the request must carry
    #[serde(default)]
    pub required_encryption: EncryptionLevel,
}

/// The full layered permission document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataPermissions {
    /// Whether permission gating is performed at all
    pub enabled: bool,
    /// The layers, all of which must permit an applicable operation
    #[serde(default)]
    pub layers: Vec<PermissionLayer>,
}

impl DataPermissions {
    /// A document that permits everything
    pub fn allow_all() -> Self {
        Self {
            enabled: false,
            layers: Vec::new(),
        }
    }
}

/// The caller-supplied authorization context evaluated against the layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccessContext {
    /// Authorization level the caller holds
    pub authorization: AuthorizationLevel,
    /// Encryption level the operation payload carries
    pub encryption: EncryptionLevel,
}
