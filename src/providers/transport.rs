//! Named-action transport and the adapter that maps the action traits onto it.

use super::{
    Attributes, PlatformApplicationActions, PlatformApplicationPage, PlatformApplicationSummary,
    PlatformKind, PolicyActions, PolicyHandle, PolicyVersion, ProviderError, VersionId,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Remote service a named action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Iot,
    Sns,
    SecretsManager,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Iot => "iot",
            Service::Sns => "sns",
            Service::SecretsManager => "secretsmanager",
        }
    }
}

/// Turns a named action plus parameters into a remote request.
///
/// `region` overrides the transport's configured region for this call only.
/// Any transport or API failure comes back as a [`ProviderError`] carrying the
/// remote error code when one was reported.
#[async_trait]
pub trait ActionTransport: Send + Sync {
    async fn send(
        &self,
        service: Service,
        action: &str,
        params: serde_json::Value,
        region: Option<&str>,
    ) -> Result<serde_json::Value, ProviderError>;
}

fn decode<T: DeserializeOwned>(action: &str, value: serde_json::Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::malformed(action, e))
}

fn version_id(action: &str, raw: &str) -> Result<VersionId, ProviderError> {
    VersionId::parse(raw).ok_or_else(|| ProviderError::malformed(action, format!("version id '{raw}' is not numeric")))
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyResult {
    policy_arn: String,
    #[serde(alias = "defaultVersionId")]
    policy_version_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPolicyVersionsResult {
    #[serde(default)]
    policy_versions: Vec<PolicyVersionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyVersionEntry {
    version_id: String,
    #[serde(default)]
    is_default_version: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePlatformApplicationResult {
    platform_application_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListPlatformApplicationsResult {
    #[serde(default)]
    platform_applications: Vec<PlatformApplicationEntry>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlatformApplicationEntry {
    platform_application_arn: Option<String>,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PlatformApplicationRequest<'a> {
    name: &'a str,
    platform: PlatformKind,
    attributes: &'a Attributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResult {
    secret_string: Option<String>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Implements the action traits on top of any [`ActionTransport`].
pub struct TransportActions<T: ?Sized> {
    transport: Arc<T>,
    region: Option<String>,
}

impl<T: ActionTransport + ?Sized> TransportActions<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            region: None,
        }
    }

    /// Same transport, every call aimed at `region`.
    pub fn with_region(&self, region: &str) -> Self {
        Self {
            transport: self.transport.clone(),
            region: Some(region.to_string()),
        }
    }

    async fn call(&self, service: Service, action: &str, params: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        debug!("Sending {}/{} region={:?}", service.as_str(), action, self.region);
        self.transport
            .send(service, action, params, self.region.as_deref())
            .await
    }

    async fn policy_call(&self, action: &str, params: serde_json::Value) -> Result<PolicyHandle, ProviderError> {
        let result: PolicyResult = decode(action, self.call(Service::Iot, action, params).await?)?;
        Ok(PolicyHandle {
            version_id: version_id(action, &result.policy_version_id)?,
            arn: result.policy_arn,
        })
    }
}

/// Read `SecretString` for a secret through the transport. `Ok(None)` when the
/// secret exists but carries only binary data.
pub(crate) async fn get_secret_value<T: ActionTransport + ?Sized>(
    transport: &T,
    secret_id: &str,
    region: Option<&str>,
) -> Result<Option<String>, ProviderError> {
    let action = "GetSecretValue";
    let value = transport
        .send(Service::SecretsManager, action, json!({ "SecretId": secret_id }), region)
        .await?;
    let result: GetSecretValueResult = decode(action, value)?;
    Ok(result.secret_string)
}

#[async_trait]
impl<T: ActionTransport + ?Sized + 'static> PolicyActions for TransportActions<T> {
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PolicyActions> {
        Arc::new(self.with_region(region))
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<PolicyHandle, ProviderError> {
        self.policy_call(
            "CreatePolicy",
            json!({ "policyName": name, "policyDocument": document }),
        )
        .await
    }

    async fn get_policy(&self, name: &str) -> Result<Option<PolicyHandle>, ProviderError> {
        match self.policy_call("GetPolicy", json!({ "policyName": name })).await {
            Ok(handle) => Ok(Some(handle)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_policy_versions(&self, name: &str) -> Result<Vec<PolicyVersion>, ProviderError> {
        let action = "ListPolicyVersions";
        let value = self
            .call(Service::Iot, action, json!({ "policyName": name }))
            .await?;
        let result: ListPolicyVersionsResult = decode(action, value)?;
        result
            .policy_versions
            .into_iter()
            .map(|v| {
                Ok(PolicyVersion {
                    version_id: version_id(action, &v.version_id)?,
                    is_default: v.is_default_version,
                })
            })
            .collect()
    }

    async fn create_policy_version(
        &self,
        name: &str,
        document: &str,
        set_as_default: bool,
    ) -> Result<PolicyHandle, ProviderError> {
        self.policy_call(
            "CreatePolicyVersion",
            json!({
                "policyName": name,
                "policyDocument": document,
                "setAsDefault": set_as_default,
            }),
        )
        .await
    }

    async fn delete_policy_version(&self, name: &str, version_id: &VersionId) -> Result<(), ProviderError> {
        self.call(
            Service::Iot,
            "DeletePolicyVersion",
            json!({ "policyName": name, "policyVersionId": version_id.as_str() }),
        )
        .await?;
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> Result<(), ProviderError> {
        self.call(Service::Iot, "DeletePolicy", json!({ "policyName": name }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<T: ActionTransport + ?Sized + 'static> PlatformApplicationActions for TransportActions<T> {
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PlatformApplicationActions> {
        Arc::new(self.with_region(region))
    }

    async fn create_platform_application(
        &self,
        name: &str,
        platform: PlatformKind,
        attributes: &Attributes,
    ) -> Result<String, ProviderError> {
        let action = "CreatePlatformApplication";
        let params = serde_json::to_value(PlatformApplicationRequest {
            name,
            platform,
            attributes,
        })
        .map_err(|e| ProviderError::new(action, e.to_string()))?;
        let result: CreatePlatformApplicationResult =
            decode(action, self.call(Service::Sns, action, params).await?)?;
        Ok(result.platform_application_arn)
    }

    async fn list_platform_applications(
        &self,
        next_token: Option<&str>,
    ) -> Result<PlatformApplicationPage, ProviderError> {
        let action = "ListPlatformApplications";
        let params = match next_token {
            Some(token) => json!({ "NextToken": token }),
            None => json!({}),
        };
        let result: ListPlatformApplicationsResult =
            decode(action, self.call(Service::Sns, action, params).await?)?;
        Ok(PlatformApplicationPage {
            applications: result
                .platform_applications
                .into_iter()
                .map(|entry| PlatformApplicationSummary {
                    arn: entry.platform_application_arn,
                    attributes: entry.attributes,
                })
                .collect(),
            next_token: result.next_token,
        })
    }

    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> Result<(), ProviderError> {
        self.call(
            Service::Sns,
            "SetPlatformApplicationAttributes",
            json!({ "PlatformApplicationArn": arn, "Attributes": attributes }),
        )
        .await?;
        Ok(())
    }

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ProviderError> {
        self.call(
            Service::Sns,
            "DeletePlatformApplication",
            json!({ "PlatformApplicationArn": arn }),
        )
        .await?;
        Ok(())
    }
}
