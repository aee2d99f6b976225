use super::Config;
use crate::infra::secrets::SecretProviderKind;

use anyhow::Result;
use tracing::warn;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn error(path: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    match config.actions.endpoint.as_deref() {
        Some(endpoint) => match url::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(_) => errors.push(error("actions.endpoint", "Endpoint must be an http(s) URL")),
            Err(e) => errors.push(error("actions.endpoint", &format!("Invalid URL: {e}"))),
        },
        None => warn!("No action endpoint configured; only in-process providers can be used"),
    }

    if config.actions.timeout_secs == 0 {
        errors.push(error("actions.timeoutSecs", "Timeout must be greater than 0"));
    }

    match config.secrets.provider {
        SecretProviderKind::Exec => {
            let has_command = config
                .secrets
                .command
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty());
            if !has_command {
                errors.push(error(
                    "secrets.command",
                    "The exec secret provider requires a command template",
                ));
            }
        }
        SecretProviderKind::Actions if config.actions.endpoint.is_none() => {
            errors.push(error(
                "secrets.provider",
                "The actions secret provider requires actions.endpoint",
            ));
        }
        SecretProviderKind::Static => {
            errors.push(error(
                "secrets.provider",
                "The static secret provider is only available in-process",
            ));
        }
        _ => {}
    }

    if config.gateway.port == 0 {
        errors.push(error("gateway.port", "Port must be greater than 0"));
    }

    if config.gateway.bind.parse::<std::net::IpAddr>().is_err() {
        errors.push(error("gateway.bind", "Bind must be an IP address"));
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
