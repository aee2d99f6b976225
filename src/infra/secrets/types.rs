//! Core types for secret resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Provider kinds
// ============================================================================

/// Which backend resolves secret names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretProviderKind {
    /// Environment variables derived from the secret name.
    #[default]
    Env,
    /// An external command such as a secrets-manager CLI.
    Exec,
    /// `GetSecretValue` through the configured action endpoint.
    Actions,
    /// Fixed in-process map.
    Static,
}

impl std::str::FromStr for SecretProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(SecretProviderKind::Env),
            "exec" => Ok(SecretProviderKind::Exec),
            "actions" => Ok(SecretProviderKind::Actions),
            "static" => Ok(SecretProviderKind::Static),
            other => Err(format!("unknown secret provider '{other}'")),
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Result of resolving a single secret name.
#[derive(Debug, Clone)]
pub enum SecretResolution {
    /// Successfully resolved to a value.
    Resolved(String),
    /// Resolution failed with a reason.
    Failed(String),
    /// The name does not resolve to anything.
    NotFound(String),
}

impl SecretResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SecretResolution::Resolved(_))
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            SecretResolution::Resolved(v) => Some(v),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SecretResolution::Failed(msg) | SecretResolution::NotFound(msg) => Some(msg),
            SecretResolution::Resolved(_) => None,
        }
    }

    /// Convert into a `Result`, tagging failures with the secret name.
    pub fn into_result(self, name: &str) -> Result<String, SecretError> {
        match self {
            SecretResolution::Resolved(value) => Ok(value),
            SecretResolution::NotFound(reason) => Err(SecretError::NotFound {
                name: name.to_string(),
                reason,
            }),
            SecretResolution::Failed(reason) => Err(SecretError::Failed {
                name: name.to_string(),
                reason,
            }),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("secret '{name}' not found: {reason}")]
    NotFound { name: String, reason: String },

    #[error("failed to resolve secret '{name}': {reason}")]
    Failed { name: String, reason: String },
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Exchanges a secret name for its current string payload.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    fn kind(&self) -> SecretProviderKind;

    /// Display name for logging.
    fn name(&self) -> &str;

    async fn resolve(&self, secret_name: &str) -> SecretResolution;

    /// The provider to use for resources in `region`. Sources with no notion
    /// of region return themselves.
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn SecretProvider>;

    /// Check if the provider can run at all (e.g., its binary exists).
    fn is_available(&self) -> bool {
        true
    }

    /// Resolve `secret_name`, failing with [`SecretError::NotFound`] when it
    /// does not resolve.
    async fn get_secret(&self, secret_name: &str) -> Result<String, SecretError> {
        if !self.is_available() {
            return Err(SecretError::Failed {
                name: secret_name.to_string(),
                reason: format!("provider '{}' is not available", self.name()),
            });
        }
        self.resolve(secret_name).await.into_result(secret_name)
    }
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_short_value() {
        assert_eq!(redact_secret("abc"), "***");
    }

    #[test]
    fn redact_long_value() {
        let redacted = redact_secret("AAAAB3NzaC1yc2EAAAADAQ");
        assert!(redacted.starts_with("AA"));
        assert!(redacted.ends_with("AQ"));
        assert!(redacted.contains('…'));
    }

    #[test]
    fn redact_multibyte_value() {
        let redacted = redact_secret("ключ-секрет-123");
        assert!(redacted.starts_with("кл"));
        assert!(redacted.ends_with("23"));
    }

    #[test]
    fn secret_resolution_helpers() {
        let ok = SecretResolution::Resolved("value".into());
        assert!(ok.is_resolved());
        assert_eq!(ok.value(), Some("value"));
        assert!(ok.error_message().is_none());

        let fail = SecretResolution::Failed("timeout".into());
        assert!(!fail.is_resolved());
        assert!(fail.value().is_none());
        assert_eq!(fail.error_message(), Some("timeout"));
    }

    #[test]
    fn not_found_maps_to_secret_not_found() {
        let err = SecretResolution::NotFound("no such secret".into())
            .into_result("prod/apns")
            .unwrap_err();
        assert!(matches!(err, SecretError::NotFound { ref name, .. } if name == "prod/apns"));
    }

    #[test]
    fn provider_kind_parses() {
        assert_eq!("EXEC".parse::<SecretProviderKind>(), Ok(SecretProviderKind::Exec));
        assert!("vault".parse::<SecretProviderKind>().is_err());
    }
}
