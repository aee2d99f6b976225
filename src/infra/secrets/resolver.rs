//! Builds the configured secret provider.

use super::types::{SecretProvider, SecretProviderKind};
use super::{ActionsSecretProvider, EnvSecretProvider, ExecSecretProvider};
use crate::config::SecretsConfig;
use crate::providers::transport::ActionTransport;

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

/// Resolve the secret provider named in configuration.
///
/// `transport` backs the `actions` provider and is ignored by the others.
pub fn resolve_secret_provider(
    config: &SecretsConfig,
    transport: Arc<dyn ActionTransport>,
) -> Result<Arc<dyn SecretProvider>> {
    let provider: Arc<dyn SecretProvider> = match config.provider {
        SecretProviderKind::Env => Arc::new(EnvSecretProvider::new(config.env_prefix.clone())),
        SecretProviderKind::Exec => {
            let command = config
                .command
                .clone()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("secrets.command is required for the exec provider"))?;
            Arc::new(ExecSecretProvider::new(command))
        }
        SecretProviderKind::Actions => Arc::new(ActionsSecretProvider::new(transport)),
        SecretProviderKind::Static => {
            bail!("The static secret provider cannot be configured from a file")
        }
    };

    if !provider.is_available() {
        bail!("Secret provider '{}' is not available", provider.name());
    }

    info!("Using '{}' secret provider", provider.name());
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::transport::Service;
    use crate::providers::ProviderError;
    use async_trait::async_trait;

    struct NoTransport;

    #[async_trait]
    impl ActionTransport for NoTransport {
        async fn send(
            &self,
            _service: Service,
            action: &str,
            _params: serde_json::Value,
            _region: Option<&str>,
        ) -> Result<serde_json::Value, ProviderError> {
            Err(ProviderError::new(action, "no transport"))
        }
    }

    #[test]
    fn env_is_the_default() {
        let provider = resolve_secret_provider(&SecretsConfig::default(), Arc::new(NoTransport)).unwrap();
        assert_eq!(provider.kind(), SecretProviderKind::Env);
    }

    #[test]
    fn exec_requires_command() {
        let config = SecretsConfig {
            provider: SecretProviderKind::Exec,
            ..SecretsConfig::default()
        };
        assert!(resolve_secret_provider(&config, Arc::new(NoTransport)).is_err());
    }

    #[test]
    fn static_cannot_be_configured() {
        let config = SecretsConfig {
            provider: SecretProviderKind::Static,
            ..SecretsConfig::default()
        };
        assert!(resolve_secret_provider(&config, Arc::new(NoTransport)).is_err());
    }
}
