//! External command secret provider.
//!
//! Runs a configured command template with `{name}` replaced by the secret
//! name and uses trimmed stdout as the payload, e.g.
//! `aws secretsmanager get-secret-value --secret-id {name} --query SecretString --output text`.

use super::types::{SecretProvider, SecretProviderKind, SecretResolution};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

/// Maximum execution time for secret-resolving commands.
const EXEC_TIMEOUT_SECS: u64 = 30;

/// Maximum output size from a secret command (1 MB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

const NAME_PLACEHOLDER: &str = "{name}";

/// Resolves secrets by executing an external command.
pub struct ExecSecretProvider {
    template: String,
}

impl ExecSecretProvider {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Split the template into program and args with the name substituted.
    ///
    /// Substitution happens per argument after splitting, so a secret name
    /// can never inject extra arguments.
    fn command_parts(&self, secret_name: &str) -> Option<(String, Vec<String>)> {
        let mut parts = self
            .template
            .split_whitespace()
            .map(|part| part.replace(NAME_PLACEHOLDER, secret_name));
        let program = parts.next()?;
        Some((program, parts.collect()))
    }
}

#[async_trait]
impl SecretProvider for ExecSecretProvider {
    fn kind(&self) -> SecretProviderKind {
        SecretProviderKind::Exec
    }

    fn name(&self) -> &str {
        "exec"
    }

    fn in_region(self: Arc<Self>, _region: &str) -> Arc<dyn SecretProvider> {
        self
    }

    async fn resolve(&self, secret_name: &str) -> SecretResolution {
        let (program, args) = match self.command_parts(secret_name) {
            Some(parts) => parts,
            None => return SecretResolution::Failed("Empty command".to_string()),
        };

        if is_dangerous_command(&program) {
            return SecretResolution::Failed(format!(
                "Command '{}' is not allowed for secret resolution",
                program
            ));
        }

        let mut cmd = Command::new(&program);
        cmd.args(&args);

        // No stdin, so interactive commands cannot hang.
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let result = tokio::time::timeout(Duration::from_secs(EXEC_TIMEOUT_SECS), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "Secret command '{}' for '{}' failed with status {}",
                        program, secret_name, output.status
                    );
                    return SecretResolution::Failed(format!(
                        "Command exited with status {}: {}",
                        output.status,
                        stderr.trim()
                    ));
                }

                if output.stdout.len() > MAX_OUTPUT_BYTES {
                    return SecretResolution::Failed(format!(
                        "Command output exceeds {} bytes",
                        MAX_OUTPUT_BYTES
                    ));
                }

                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();

                if value.is_empty() {
                    SecretResolution::NotFound(format!(
                        "Command '{}' produced empty output for '{}'",
                        program, secret_name
                    ))
                } else {
                    SecretResolution::Resolved(value)
                }
            }
            Ok(Err(e)) => {
                SecretResolution::Failed(format!("Failed to execute '{}': {}", program, e))
            }
            Err(_) => SecretResolution::Failed(format!(
                "Command '{}' timed out after {}s",
                program, EXEC_TIMEOUT_SECS
            )),
        }
    }
}

/// Check if a command is too dangerous for secret resolution.
fn is_dangerous_command(program: &str) -> bool {
    let basename = program.rsplit('/').next().unwrap_or(program);

    matches!(
        basename,
        "rm" | "rmdir" | "mkfs" | "dd" | "shutdown" | "reboot" | "halt" | "poweroff" | "kill"
            | "killall" | "pkill" | "format" | "fdisk" | "parted"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_name_per_argument() {
        let provider = ExecSecretProvider::new("vault read -field=value secret/{name}");
        let (program, args) = provider.command_parts("apns key").unwrap();
        assert_eq!(program, "vault");
        assert_eq!(args, vec!["read", "-field=value", "secret/apns key"]);
    }

    #[tokio::test]
    async fn resolve_echo_command() {
        let provider = ExecSecretProvider::new("echo {name}-payload");
        let result = provider.resolve("gcm").await;
        assert_eq!(result.value(), Some("gcm-payload"));
    }

    #[tokio::test]
    async fn resolve_failing_command() {
        let provider = ExecSecretProvider::new("false {name}");
        let result = provider.resolve("gcm").await;
        assert!(!result.is_resolved());
    }

    #[tokio::test]
    async fn reject_dangerous_command() {
        let provider = ExecSecretProvider::new("rm -rf {name}");
        let result = provider.resolve("tmp").await;
        assert!(result.error_message().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn empty_template_fails() {
        let provider = ExecSecretProvider::new("   ");
        assert!(!provider.resolve("gcm").await.is_resolved());
    }

    #[test]
    fn dangerous_command_detection() {
        assert!(is_dangerous_command("/bin/rm"));
        assert!(!is_dangerous_command("aws"));
        assert!(!is_dangerous_command("vault"));
    }
}
