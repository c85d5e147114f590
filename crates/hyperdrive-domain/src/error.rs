//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the HyperDrive orchestration core
#[derive(Error, Debug)]
pub enum Error {
    /// An applicable data-permission layer rejected the operation
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Which layer rejected and why
        message: String,
    },

    /// Usage is over the subscription plan limit for the resource
    #[error("Quota exceeded for {resource}: {message}")]
    QuotaExceeded {
        /// The resource whose quota was exhausted
        resource: String,
        /// Usage detail
        message: String,
    },

    /// Every capable provider was excluded (isolated, quota, permissions)
    #[error("No eligible provider for {capability}: {message}")]
    NoEligibleProvider {
        /// The requested capability
        capability: String,
        /// Why the candidate set is empty
        message: String,
    },

    /// A provider dispatch exceeded its deadline
    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// The provider that timed out
        provider: String,
        /// The deadline that was exceeded
        timeout_ms: u64,
    },

    /// A provider executor returned a failure
    #[error("Provider {provider} error: {message}")]
    ProviderError {
        /// The provider that failed
        provider: String,
        /// Failure detail from the executor
        message: String,
    },

    /// The caller cancelled the operation while it was in flight
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A rule document failed validation at construction
    #[error("Invalid rule: {message}")]
    InvalidRule {
        /// Which constraint the document violates
        message: String,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Gating error creation methods
impl Error {
    /// Create a permission-denied error
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a quota-exceeded error
    pub fn quota_exceeded<R: Into<String>, S: Into<String>>(resource: R, message: S) -> Self {
        Self::QuotaExceeded {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a no-eligible-provider error
    pub fn no_eligible_provider<C: Into<String>, S: Into<String>>(
        capability: C,
        message: S,
    ) -> Self {
        Self::NoEligibleProvider {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

// Dispatch error creation methods
impl Error {
    /// Create a provider-timeout error
    pub fn provider_timeout<S: Into<String>>(provider: S, timeout_ms: u64) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            timeout_ms,
        }
    }

    /// Create a provider error
    pub fn provider_error<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

// Ambient error creation methods
impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-rule error
    pub fn invalid_rule<S: Into<String>>(message: S) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl Error {
    /// Whether the error is terminal for the request (never retried against
    /// another provider)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::QuotaExceeded { .. }
                | Self::NoEligibleProvider { .. }
                | Self::Cancelled
        )
    }
}
