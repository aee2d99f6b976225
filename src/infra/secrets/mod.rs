//! Secret resolution for credential hydration.
//!
//! A secret name is exchanged for its current string payload through one
//! configured [`SecretProvider`]. Payload interpretation (JSON fields versus a
//! bare key) happens in the reconcilers, not here.

pub mod actions_provider;
pub mod env_provider;
pub mod exec_provider;
pub mod resolver;
pub mod static_provider;
pub mod types;

pub use actions_provider::ActionsSecretProvider;
pub use env_provider::EnvSecretProvider;
pub use exec_provider::ExecSecretProvider;
pub use resolver::resolve_secret_provider;
pub use static_provider::StaticSecretProvider;
pub use types::{redact_secret, SecretError, SecretProvider, SecretProviderKind, SecretResolution};
