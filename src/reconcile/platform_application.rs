use super::credentials;
use super::model::{LifecycleResponse, PlatformApplicationDescriptor, RequestType};
use super::{ReconcileStage, StageTracker};
use crate::error::{ReconcileError, ReconcileResult};
use crate::infra::secrets::SecretProvider;
use crate::providers::{platform_applications, Attributes, PlatformApplicationActions, PlatformKind};

use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const RESOURCE: &str = "platform application";

/// A remote platform application matched by name and platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplicationIdentity {
    pub arn: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplicationOutcome {
    pub physical_id: String,
    /// Empty when a delete found nothing to remove.
    pub arn: String,
}

impl From<PlatformApplicationOutcome> for LifecycleResponse {
    fn from(outcome: PlatformApplicationOutcome) -> Self {
        LifecycleResponse {
            physical_resource_id: outcome.physical_id,
            data: BTreeMap::from([("platformApplicationArn".to_string(), outcome.arn)]),
        }
    }
}

fn matches_key(attributes: &Attributes, name: &str, platform: PlatformKind) -> bool {
    attributes.get("Name").map(String::as_str) == Some(name)
        && attributes.get("Platform").map(String::as_str) == Some(platform.as_str())
}

pub struct PlatformApplicationReconciler {
    actions: Arc<dyn PlatformApplicationActions>,
    secrets: Arc<dyn SecretProvider>,
}

impl PlatformApplicationReconciler {
    pub fn new(actions: Arc<dyn PlatformApplicationActions>, secrets: Arc<dyn SecretProvider>) -> Self {
        Self { actions, secrets }
    }

    pub fn physical_id(name: &str, platform: PlatformKind) -> String {
        format!("PlatformApplication:{name}:{platform}")
    }

    /// Scan the full listing for an exact `(name, platform)` match.
    ///
    /// Every page is read even after a match so the cost and the answer do not
    /// depend on listing order beyond "first match wins".
    pub async fn resolve_identity(
        &self,
        name: &str,
        platform: PlatformKind,
    ) -> ReconcileResult<Option<PlatformApplicationIdentity>> {
        let mut listing = platform_applications(self.actions.as_ref());
        let mut found = None;
        let mut scanned = 0usize;

        while let Some(summary) = listing.try_next().await? {
            scanned += 1;
            if found.is_some() || !matches_key(&summary.attributes, name, platform) {
                continue;
            }
            if let Some(arn) = summary.arn {
                found = Some(PlatformApplicationIdentity {
                    arn,
                    attributes: summary.attributes,
                });
            }
        }

        debug!(application = %name, %platform, scanned, found = found.is_some(), "Resolved identity");
        Ok(found)
    }

    pub async fn build_attributes(&self, desired: &PlatformApplicationDescriptor) -> ReconcileResult<Attributes> {
        credentials::build_attributes(desired, self.secrets.as_ref()).await
    }

    pub async fn create(&self, desired: &PlatformApplicationDescriptor) -> ReconcileResult<PlatformApplicationOutcome> {
        let mut stage = StageTracker::new(RESOURCE, RequestType::Create);
        stage.enter(ReconcileStage::Resolving);
        let attributes = self.build_attributes(desired).await?;

        stage.enter(ReconcileStage::Mutating);
        let arn = self
            .actions
            .create_platform_application(&desired.name, desired.platform, &attributes)
            .await?;

        stage.enter(ReconcileStage::Done);
        info!(application = %desired.name, platform = %desired.platform, %arn, "Created platform application");

        Ok(PlatformApplicationOutcome {
            physical_id: Self::physical_id(&desired.name, desired.platform),
            arn,
        })
    }

    /// A change of name or platform replaces the application; anything else
    /// updates attributes in place under the same physical id.
    pub async fn update(
        &self,
        physical_id: &str,
        previous: &PlatformApplicationDescriptor,
        desired: &PlatformApplicationDescriptor,
    ) -> ReconcileResult<PlatformApplicationOutcome> {
        if previous.key() != desired.key() {
            info!(
                from = %previous.name,
                to = %desired.name,
                platform = %desired.platform,
                "Natural key changed; creating replacement platform application"
            );
            return self.create(desired).await;
        }

        let mut stage = StageTracker::new(RESOURCE, RequestType::Update);
        stage.enter(ReconcileStage::Resolving);
        let identity = self
            .resolve_identity(&desired.name, desired.platform)
            .await?
            .ok_or_else(|| ReconcileError::NotFound {
                kind: RESOURCE,
                name: desired.name.clone(),
            })?;
        let attributes = self.build_attributes(desired).await?;

        stage.enter(ReconcileStage::Mutating);
        self.actions
            .set_platform_application_attributes(&identity.arn, &attributes)
            .await?;

        stage.enter(ReconcileStage::Done);
        info!(application = %desired.name, arn = %identity.arn, "Updated platform application");

        Ok(PlatformApplicationOutcome {
            physical_id: physical_id.to_string(),
            arn: identity.arn,
        })
    }

    pub async fn delete(
        &self,
        physical_id: &str,
        desired: &PlatformApplicationDescriptor,
    ) -> ReconcileResult<PlatformApplicationOutcome> {
        let mut stage = StageTracker::new(RESOURCE, RequestType::Delete);
        stage.enter(ReconcileStage::Resolving);

        let Some(identity) = self.resolve_identity(&desired.name, desired.platform).await? else {
            stage.enter(ReconcileStage::Done);
            info!(application = %desired.name, "Platform application already absent");
            return Ok(PlatformApplicationOutcome {
                physical_id: physical_id.to_string(),
                arn: String::new(),
            });
        };

        stage.enter(ReconcileStage::Mutating);
        self.actions.delete_platform_application(&identity.arn).await?;

        stage.enter(ReconcileStage::Done);
        info!(application = %desired.name, arn = %identity.arn, "Deleted platform application");

        Ok(PlatformApplicationOutcome {
            physical_id: physical_id.to_string(),
            arn: identity.arn,
        })
    }
}
