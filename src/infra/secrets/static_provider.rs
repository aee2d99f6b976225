//! Fixed in-process secrets, for tests and local runs.

use super::types::{SecretProvider, SecretProviderKind, SecretResolution};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct StaticSecretProvider {
    secrets: RwLock<HashMap<String, String>>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.secrets.write().remove(name)
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    fn kind(&self) -> SecretProviderKind {
        SecretProviderKind::Static
    }

    fn name(&self) -> &str {
        "static"
    }

    fn in_region(self: Arc<Self>, _region: &str) -> Arc<dyn SecretProvider> {
        self
    }

    async fn resolve(&self, secret_name: &str) -> SecretResolution {
        match self.secrets.read().get(secret_name) {
            Some(value) => SecretResolution::Resolved(value.clone()),
            None => SecretResolution::NotFound(format!("no static secret named '{secret_name}'")),
        }
    }
}
