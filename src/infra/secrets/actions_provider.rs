//! Secrets read with `GetSecretValue` through the action transport.

use super::types::{SecretProvider, SecretProviderKind, SecretResolution};
use crate::providers::transport::{get_secret_value, ActionTransport};

use async_trait::async_trait;
use std::sync::Arc;

pub struct ActionsSecretProvider {
    transport: Arc<dyn ActionTransport>,
    region: Option<String>,
}

impl ActionsSecretProvider {
    pub fn new(transport: Arc<dyn ActionTransport>) -> Self {
        Self {
            transport,
            region: None,
        }
    }
}

#[async_trait]
impl SecretProvider for ActionsSecretProvider {
    fn kind(&self) -> SecretProviderKind {
        SecretProviderKind::Actions
    }

    fn name(&self) -> &str {
        "actions"
    }

    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn SecretProvider> {
        Arc::new(Self {
            transport: self.transport.clone(),
            region: Some(region.to_string()),
        })
    }

    async fn resolve(&self, secret_name: &str) -> SecretResolution {
        match get_secret_value(self.transport.as_ref(), secret_name, self.region.as_deref()).await {
            Ok(Some(value)) if !value.is_empty() => SecretResolution::Resolved(value),
            Ok(_) => SecretResolution::NotFound(format!(
                "Secret '{secret_name}' has no string value"
            )),
            Err(e) if e.is_not_found() => SecretResolution::NotFound(e.to_string()),
            Err(e) => SecretResolution::Failed(e.to_string()),
        }
    }
}
