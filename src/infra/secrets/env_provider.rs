//! Environment variable secret provider.
//!
//! Secret `prod/apns-signing-key` with prefix `RECONCILER_SECRET_` is read
//! from `RECONCILER_SECRET_PROD_APNS_SIGNING_KEY`.

use super::types::{SecretProvider, SecretProviderKind, SecretResolution};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves secrets from environment variables.
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The environment variable a secret name maps to.
    pub fn variable_name(&self, secret_name: &str) -> String {
        let normalized: String = secret_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    fn kind(&self) -> SecretProviderKind {
        SecretProviderKind::Env
    }

    fn name(&self) -> &str {
        "env"
    }

    fn in_region(self: Arc<Self>, _region: &str) -> Arc<dyn SecretProvider> {
        self
    }

    async fn resolve(&self, secret_name: &str) -> SecretResolution {
        let var = self.variable_name(secret_name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => SecretResolution::Resolved(value),
            Ok(_) => SecretResolution::NotFound(format!(
                "Environment variable '{var}' is set but empty"
            )),
            Err(_) => SecretResolution::NotFound(format!(
                "Environment variable '{var}' is not set"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_name_normalizes_separators() {
        let provider = EnvSecretProvider::new("RECONCILER_SECRET_");
        assert_eq!(
            provider.variable_name("prod/apns-signing.key"),
            "RECONCILER_SECRET_PROD_APNS_SIGNING_KEY"
        );
    }

    #[tokio::test]
    async fn resolve_existing_env_var() {
        // PATH should always exist
        let provider = EnvSecretProvider::new("");
        let result = provider.resolve("path").await;
        assert!(result.is_resolved());
    }

    #[tokio::test]
    async fn resolve_missing_env_var() {
        let provider = EnvSecretProvider::new("RECONCILER_SECRET_");
        let err = provider
            .get_secret("definitely/does-not-exist-xyz")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not set"));
    }
}
