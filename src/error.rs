use crate::infra::secrets::SecretError;
use crate::providers::ProviderError;
use thiserror::Error;

/// Failure of a single reconciliation.
///
/// Every variant ends the invocation; nothing here is retried locally.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The target must exist for this operation and does not.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A create collided with an existing resource of the same name.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// The event or descriptor is unusable. Raised before any mutating call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The eviction step found no non-default version to delete.
    #[error("cannot evict a version of policy '{policy_name}': {detail}")]
    EvictionInvariantViolation { policy_name: String, detail: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReconcileError::Validation(message.into())
    }

    /// Stable machine-readable code for gateway and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::NotFound { .. } => "NotFound",
            ReconcileError::AlreadyExists { .. } => "AlreadyExists",
            ReconcileError::Validation(_) => "ValidationError",
            ReconcileError::EvictionInvariantViolation { .. } => "EvictionInvariantViolation",
            ReconcileError::Provider(_) => "ProviderError",
            ReconcileError::Secret(SecretError::NotFound { .. }) => "SecretNotFound",
            ReconcileError::Secret(_) => "SecretError",
        }
    }
}
