//! Lifecycle events, descriptors and the validated reconciliation request.

use crate::error::{ReconcileError, ReconcileResult};
use crate::providers::{Attributes, PlatformKind};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Lifecycle Event
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// Custom-resource lifecycle event as delivered by the provisioning framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<serde_json::Value>,
}

/// What the framework receives back for a successful event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleResponse {
    pub physical_resource_id: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Per-event settings carried alongside the resource properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Region the resource lives in; `None` uses the configured region.
    pub region: Option<String>,
    /// `debug: "enabled"` asks for a verbose trace of this one event.
    pub debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct OptionProperties {
    #[serde(default)]
    region: Option<serde_json::Value>,
    #[serde(default)]
    debug: Option<serde_json::Value>,
}

impl EventOptions {
    pub fn from_properties(properties: &serde_json::Value) -> ReconcileResult<Self> {
        let raw: OptionProperties = match properties {
            serde_json::Value::Object(_) => serde_json::from_value(properties.clone())
                .map_err(|e| ReconcileError::validation(describe_serde_error("event options", &e)))?,
            _ => OptionProperties::default(),
        };

        let region = match raw.region {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(region)) => {
                Some(region.trim().to_string()).filter(|r| !r.is_empty())
            }
            Some(_) => return Err(ReconcileError::validation("region must be a string")),
        };

        let debug = match raw.debug {
            Some(serde_json::Value::String(flag)) => flag.eq_ignore_ascii_case("enabled"),
            Some(serde_json::Value::Bool(flag)) => flag,
            _ => false,
        };

        Ok(Self { region, debug })
    }
}

/// Validation text for a serde failure without the offending value.
///
/// serde quotes the value it rejected (`invalid type: integer `123``), which
/// may be credential material, so only the expectation is kept.
pub(crate) fn describe_serde_error(context: &str, error: &serde_json::Error) -> String {
    let message = error.to_string();
    match message.split_once(", expected ") {
        Some((_, expected)) => format!("invalid {context}: unexpected value, expected {expected}"),
        None if message.starts_with("invalid ") || message.starts_with("unknown ") => {
            format!("invalid {context}: malformed value")
        }
        None => format!("invalid {context}: {message}"),
    }
}

// ============================================================================
// Resource Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Policy,
    PlatformApplication,
}

const POLICY_RESOURCE_TYPES: &[&str] = &["Custom::VersionedIoTPolicy", "Custom::VersionedPolicy"];

const PLATFORM_APPLICATION_RESOURCE_TYPES: &[&str] = &[
    "Custom::SNSPlatformApplication",
    "Custom::SNSPlatformApplicationAPNS",
    "Custom::SNSPlatformApplicationFirebase",
    "Custom::GG-SNSPlatformApplication",
];

impl ResourceKind {
    /// Kind from the event's resource type, falling back to the shape of the
    /// properties for generic `AWS::CloudFormation::CustomResource` events.
    pub fn detect(resource_type: Option<&str>, properties: &serde_json::Value) -> ReconcileResult<Self> {
        if let Some(resource_type) = resource_type {
            if POLICY_RESOURCE_TYPES.contains(&resource_type) {
                return Ok(ResourceKind::Policy);
            }
            if PLATFORM_APPLICATION_RESOURCE_TYPES.contains(&resource_type) {
                return Ok(ResourceKind::PlatformApplication);
            }
        }

        if properties.get("policyName").is_some() {
            Ok(ResourceKind::Policy)
        } else if properties.get("platform").is_some() {
            Ok(ResourceKind::PlatformApplication)
        } else {
            Err(ReconcileError::validation(format!(
                "cannot determine resource kind for resource type '{}'",
                resource_type.unwrap_or("<none>")
            )))
        }
    }
}

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDescriptor {
    pub policy_name: String,
    pub policy_document: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyProperties {
    policy_name: Option<String>,
    policy_document: Option<serde_json::Value>,
}

impl PolicyDescriptor {
    pub fn from_properties(properties: &serde_json::Value) -> ReconcileResult<Self> {
        let raw: PolicyProperties = serde_json::from_value(properties.clone())
            .map_err(|e| ReconcileError::validation(describe_serde_error("policy properties", &e)))?;

        let policy_name = raw
            .policy_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ReconcileError::validation("policyName is required"))?;

        let policy_document = match raw.policy_document {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
            Some(doc @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => doc.to_string(),
            _ => return Err(ReconcileError::validation("policyDocument is required")),
        };

        Ok(Self {
            policy_name,
            policy_document,
        })
    }
}

/// Where credential material for a platform application comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSource {
    #[serde(
        alias = "signingKeySecretName",
        alias = "firebaseCloudMessagingServerKeySecretName"
    )]
    pub secret_name: Option<String>,
    pub signing_key_id: Option<String>,
    pub app_bundle_id: Option<String>,
    pub team_id: Option<String>,
    pub client_id: Option<String>,
}

impl CredentialSource {
    /// Non-secret credential fields supplied inline with the descriptor.
    pub fn inline_fields(&self) -> BTreeMap<String, String> {
        [
            ("signingKeyId", &self.signing_key_id),
            ("appBundleId", &self.app_bundle_id),
            ("teamId", &self.team_id),
            ("clientId", &self.client_id),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_ref().map(|v| (field.to_string(), v.clone())))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplicationDescriptor {
    pub name: String,
    pub platform: PlatformKind,
    pub attributes: Attributes,
    pub credentials: CredentialSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformApplicationProperties {
    name: Option<String>,
    platform: Option<String>,
    #[serde(default)]
    attributes: Option<Attributes>,
    #[serde(flatten)]
    credentials: CredentialSource,
}

impl PlatformApplicationDescriptor {
    pub fn from_properties(properties: &serde_json::Value) -> ReconcileResult<Self> {
        let raw: PlatformApplicationProperties = serde_json::from_value(properties.clone())
            .map_err(|e| {
                ReconcileError::validation(describe_serde_error("platform application properties", &e))
            })?;

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ReconcileError::validation("name is required"))?;

        let platform = raw
            .platform
            .ok_or_else(|| ReconcileError::validation("platform is required"))?
            .parse::<PlatformKind>()
            .map_err(ReconcileError::Validation)?;

        Ok(Self {
            name,
            platform,
            attributes: raw.attributes.unwrap_or_default(),
            credentials: raw.credentials,
        })
    }

    /// `name` plus `platform`: the natural key used for lookup.
    pub fn key(&self) -> (&str, PlatformKind) {
        (&self.name, self.platform)
    }
}

// ============================================================================
// Reconciliation Request
// ============================================================================

/// One lifecycle operation on a descriptor of type `D`.
///
/// Only `Create` lacks a physical id and only `Update` carries the previous
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<D> {
    Create {
        desired: D,
    },
    Update {
        physical_id: String,
        desired: D,
        previous: D,
    },
    Delete {
        physical_id: String,
        desired: D,
    },
}

impl<D> Operation<D> {
    pub fn request_type(&self) -> RequestType {
        match self {
            Operation::Create { .. } => RequestType::Create,
            Operation::Update { .. } => RequestType::Update,
            Operation::Delete { .. } => RequestType::Delete,
        }
    }

    fn from_event(
        event: &LifecycleEvent,
        parse: fn(&serde_json::Value) -> ReconcileResult<D>,
    ) -> ReconcileResult<Self> {
        let physical_id = event
            .physical_resource_id
            .clone()
            .filter(|id| !id.is_empty());

        match event.request_type {
            RequestType::Create => {
                if physical_id.is_some() {
                    return Err(ReconcileError::validation(
                        "Create events must not carry a PhysicalResourceId",
                    ));
                }
                Ok(Operation::Create {
                    desired: parse(&event.resource_properties)?,
                })
            }
            RequestType::Update => {
                let physical_id = physical_id.ok_or_else(|| {
                    ReconcileError::validation("Update events require a PhysicalResourceId")
                })?;
                let previous = event.old_resource_properties.as_ref().ok_or_else(|| {
                    ReconcileError::validation("Update events require OldResourceProperties")
                })?;
                Ok(Operation::Update {
                    physical_id,
                    desired: parse(&event.resource_properties)?,
                    previous: parse(previous)?,
                })
            }
            RequestType::Delete => {
                let physical_id = physical_id.ok_or_else(|| {
                    ReconcileError::validation("Delete events require a PhysicalResourceId")
                })?;
                Ok(Operation::Delete {
                    physical_id,
                    desired: parse(&event.resource_properties)?,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationRequest {
    Policy(Operation<PolicyDescriptor>),
    PlatformApplication(Operation<PlatformApplicationDescriptor>),
}

impl ReconciliationRequest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ReconciliationRequest::Policy(_) => ResourceKind::Policy,
            ReconciliationRequest::PlatformApplication(_) => ResourceKind::PlatformApplication,
        }
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            ReconciliationRequest::Policy(op) => op.request_type(),
            ReconciliationRequest::PlatformApplication(op) => op.request_type(),
        }
    }
}

impl TryFrom<&LifecycleEvent> for ReconciliationRequest {
    type Error = ReconcileError;

    fn try_from(event: &LifecycleEvent) -> ReconcileResult<Self> {
        let kind = ResourceKind::detect(event.resource_type.as_deref(), &event.resource_properties)?;
        match kind {
            ResourceKind::Policy => Ok(ReconciliationRequest::Policy(Operation::from_event(
                event,
                PolicyDescriptor::from_properties,
            )?)),
            ResourceKind::PlatformApplication => Ok(ReconciliationRequest::PlatformApplication(
                Operation::from_event(event, PlatformApplicationDescriptor::from_properties)?,
            )),
        }
    }
}
