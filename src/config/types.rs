use super::defaults::*;
use crate::infra::secrets::SecretProviderKind;

use serde::{Deserialize, Serialize};

// ============================================================================
// Actions
// ============================================================================

/// Where remote actions are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsConfig {
    /// Base URL of the action endpoint, e.g. `http://127.0.0.1:4566/actions`.
    pub endpoint: Option<String>,
    /// Bearer token sent with every action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub region: Option<String>,
    #[serde(default = "default_action_timeout")]
    pub timeout_secs: u64,
}

fn default_action_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT_SECS
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            region: None,
            timeout_secs: DEFAULT_ACTION_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    #[serde(default)]
    pub provider: SecretProviderKind,
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    /// Command template for the `exec` provider; `{name}` is the secret name.
    pub command: Option<String>,
}

fn default_env_prefix() -> String {
    DEFAULT_SECRET_ENV_PREFIX.to_string()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: SecretProviderKind::default(),
            env_prefix: default_env_prefix(),
            command: None,
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    /// Required bearer token for `POST /events` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_gateway_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

fn default_gateway_bind() -> String {
    DEFAULT_GATEWAY_BIND.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GATEWAY_PORT,
            bind: default_gateway_bind(),
            token: None,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LoggingLevel,
    #[serde(default)]
    pub json: bool,
}
