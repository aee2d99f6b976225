mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Top-level reconciler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(find_config_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if config_path.exists() {
            info!("Loading config from {}", config_path.display());
            load_config_file(&config_path)?
        } else if path.is_some() {
            anyhow::bail!("Config file '{}' does not exist", config_path.display());
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("RECONCILER_ACTIONS_ENDPOINT") {
            self.actions.endpoint = Some(endpoint);
        }

        if let Ok(token) = std::env::var("RECONCILER_ACTIONS_TOKEN") {
            self.actions.token = Some(token);
        }

        if let Ok(region) = std::env::var("RECONCILER_REGION") {
            self.actions.region = Some(region);
        }

        if let Ok(provider) = std::env::var("RECONCILER_SECRETS_PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.secrets.provider = kind,
                Err(e) => warn!("Ignoring RECONCILER_SECRETS_PROVIDER: {}", e),
            }
        }

        if let Ok(port) = std::env::var("RECONCILER_GATEWAY_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }

        if let Ok(token) = std::env::var("RECONCILER_GATEWAY_TOKEN") {
            self.gateway.token = Some(token);
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("reconciler.json"),
        PathBuf::from("reconciler.yaml"),
        PathBuf::from("reconciler.yml"),
        PathBuf::from("reconciler.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // Check home directory
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".resource-reconciler").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}
