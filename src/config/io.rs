use super::Config;

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Parse a JSON5 configuration string.
pub fn parse_config_json5(content: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = json5::from_str(content)?;
    Ok(value)
}

/// Read a config file into a generic value, dispatching on extension.
///
/// JSON files are parsed as JSON5 so comments and trailing commas are allowed.
pub fn read_config_value(path: &Path) -> Result<serde_json::Value> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    match path.extension().and_then(|e| e.to_str()).unwrap_or("json") {
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        "toml" => Ok(toml::from_str(&content)?),
        _ => parse_config_json5(&content),
    }
}

/// Load and deserialize a configuration file.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let value = read_config_value(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("Invalid configuration in '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::secrets::SecretProviderKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn read_json5_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("reconciler.json");
        fs::write(
            &file,
            r#"{
                // local emulator
                actions: { endpoint: "http://127.0.0.1:4566/actions", region: "eu-west-1", },
            }"#,
        )
        .unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(
            config.actions.endpoint.as_deref(),
            Some("http://127.0.0.1:4566/actions")
        );
        assert_eq!(config.actions.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn read_yaml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("reconciler.yaml");
        fs::write(
            &file,
            "secrets:\n  provider: exec\n  command: \"echo {name}\"\ngateway:\n  port: 9000\n",
        )
        .unwrap();

        let config = load_config_file(&file).unwrap();
        assert_eq!(config.secrets.provider, SecretProviderKind::Exec);
        assert_eq!(config.gateway.port, 9000);
    }

    #[test]
    fn read_toml_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("reconciler.toml");
        fs::write(&file, "[logging]\nlevel = \"debug\"\njson = true\n").unwrap();

        let config = load_config_file(&file).unwrap();
        assert!(config.logging.json);
        assert_eq!(config.logging.level.as_str(), "debug");
    }

    #[test]
    fn reject_oversized_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("huge.json");
        let content = "x".repeat((MAX_CONFIG_FILE_BYTES + 1) as usize);
        fs::write(&file, content).unwrap();

        let result = read_config_value(&file);
        assert!(result.unwrap_err().to_string().contains("exceeds limit"));
    }

    #[test]
    fn unknown_secret_provider_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("reconciler.json");
        fs::write(&file, r#"{"secrets": {"provider": "vault"}}"#).unwrap();

        assert!(load_config_file(&file).is_err());
    }
}
