//! Remote actions for the two managed resource kinds.
//!
//! The reconcilers only see the [`PolicyActions`] and
//! [`PlatformApplicationActions`] traits. Concrete providers are the
//! transport-backed adapter (real endpoints) and the in-memory fake.

mod http;
pub mod memory;
pub mod transport;

pub use http::HttpActionTransport;
pub use memory::InMemoryActions;
pub use transport::{ActionTransport, TransportActions};

use crate::config::Config;
use crate::infra::secrets::{resolve_secret_provider, SecretProvider};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// String-to-string attribute map as the remote API models it.
pub type Attributes = BTreeMap<String, String>;

// ============================================================================
// Provider Errors
// ============================================================================

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException", "NotFound", "NotFoundException"];
const ALREADY_EXISTS_CODES: &[&str] = &["ResourceAlreadyExistsException", "AlreadyExists"];

/// Opaque failure of a remote call.
#[derive(Debug, Clone, Error)]
#[error("{action} failed{}: {message}", code_suffix(.code))]
pub struct ProviderError {
    pub action: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

impl ProviderError {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The remote answered, but not in the shape the action promises.
    pub fn malformed(action: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::new(action, format!("malformed response: {detail}")).with_code("MalformedResponse")
    }

    pub fn is_not_found(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| NOT_FOUND_CODES.contains(&c))
    }

    pub fn is_already_exists(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| ALREADY_EXISTS_CODES.contains(&c))
    }
}

// ============================================================================
// Policy Types
// ============================================================================

/// A policy version id: a non-negative integer of unbounded width.
///
/// Ordering is numeric, so `"10" > "2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn significant_digits(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant_digits(), other.significant_digits());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVersion {
    pub version_id: VersionId,
    pub is_default: bool,
}

/// ARN plus the version a policy call produced or currently defaults to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyHandle {
    pub arn: String,
    pub version_id: VersionId,
}

// ============================================================================
// Platform Application Types
// ============================================================================

/// Push platform of an SNS platform application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    #[serde(rename = "ADM")]
    Adm,
    #[serde(rename = "APNS")]
    Apns,
    #[serde(rename = "APNS_SANDBOX")]
    ApnsSandbox,
    #[serde(rename = "GCM")]
    Gcm,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Adm => "ADM",
            PlatformKind::Apns => "APNS",
            PlatformKind::ApnsSandbox => "APNS_SANDBOX",
            PlatformKind::Gcm => "GCM",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ADM" => Ok(PlatformKind::Adm),
            "APNS" => Ok(PlatformKind::Apns),
            "APNS_SANDBOX" => Ok(PlatformKind::ApnsSandbox),
            "GCM" => Ok(PlatformKind::Gcm),
            other => Err(format!(
                "unsupported platform '{other}', expected one of ADM, APNS, APNS_SANDBOX, GCM"
            )),
        }
    }
}

/// One entry of the platform application listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplicationSummary {
    pub arn: Option<String>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformApplicationPage {
    pub applications: Vec<PlatformApplicationSummary>,
    pub next_token: Option<String>,
}

// ============================================================================
// Action Traits
// ============================================================================

#[async_trait]
pub trait PolicyActions: Send + Sync {
    /// The same actions aimed at `region` instead of the configured one.
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PolicyActions>;

    /// Create a policy; its first version becomes the default.
    async fn create_policy(&self, name: &str, document: &str) -> Result<PolicyHandle, ProviderError>;

    /// Current ARN and default version, or `None` when no such policy exists.
    async fn get_policy(&self, name: &str) -> Result<Option<PolicyHandle>, ProviderError>;

    async fn list_policy_versions(&self, name: &str) -> Result<Vec<PolicyVersion>, ProviderError>;

    async fn create_policy_version(
        &self,
        name: &str,
        document: &str,
        set_as_default: bool,
    ) -> Result<PolicyHandle, ProviderError>;

    async fn delete_policy_version(&self, name: &str, version_id: &VersionId) -> Result<(), ProviderError>;

    /// Delete a policy that has only its default version left.
    async fn delete_policy(&self, name: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait PlatformApplicationActions: Send + Sync {
    /// The same actions aimed at `region` instead of the configured one.
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PlatformApplicationActions>;

    /// Returns the new application's ARN.
    async fn create_platform_application(
        &self,
        name: &str,
        platform: PlatformKind,
        attributes: &Attributes,
    ) -> Result<String, ProviderError>;

    /// One page of the listing. `None` starts from the beginning.
    async fn list_platform_applications(
        &self,
        next_token: Option<&str>,
    ) -> Result<PlatformApplicationPage, ProviderError>;

    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> Result<(), ProviderError>;

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ProviderError>;
}

enum PageCursor {
    Start,
    Next(String),
    Done,
}

/// Lazily walk every platform application, page after page, until the
/// listing reports no further token.
pub fn platform_applications<'a>(
    actions: &'a dyn PlatformApplicationActions,
) -> BoxStream<'a, Result<PlatformApplicationSummary, ProviderError>> {
    stream::try_unfold(PageCursor::Start, move |cursor| async move {
        let token = match cursor {
            PageCursor::Done => return Ok(None),
            PageCursor::Start => None,
            PageCursor::Next(token) => Some(token),
        };
        let page = actions.list_platform_applications(token.as_deref()).await?;
        let next = match page.next_token {
            Some(token) if !token.is_empty() => PageCursor::Next(token),
            _ => PageCursor::Done,
        };
        Ok(Some((page.applications, next)))
    })
    .map_ok(|applications| stream::iter(applications.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}

// ============================================================================
// Provider Resolution
// ============================================================================

/// Everything a dispatcher needs, built from configuration.
pub struct ResolvedProviders {
    pub policies: Arc<dyn PolicyActions>,
    pub platform_applications: Arc<dyn PlatformApplicationActions>,
    pub secrets: Arc<dyn SecretProvider>,
}

pub fn resolve_providers(config: &Config) -> Result<ResolvedProviders> {
    let endpoint = config
        .actions
        .endpoint
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No action endpoint configured (actions.endpoint or RECONCILER_ACTIONS_ENDPOINT)"))?;

    let transport = Arc::new(HttpActionTransport::new(
        endpoint,
        config.actions.token.clone(),
        config.actions.region.clone(),
        std::time::Duration::from_secs(config.actions.timeout_secs),
    )?);
    let actions = Arc::new(TransportActions::new(transport.clone()));
    let secrets = resolve_secret_provider(&config.secrets, transport)?;

    Ok(ResolvedProviders {
        policies: actions.clone(),
        platform_applications: actions,
        secrets,
    })
}
