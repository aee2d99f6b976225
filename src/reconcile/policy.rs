use super::model::{LifecycleResponse, PolicyDescriptor, RequestType};
use super::{ReconcileStage, StageTracker};
use crate::config::MAX_POLICY_VERSIONS;
use crate::error::{ReconcileError, ReconcileResult};
use crate::providers::{PolicyActions, PolicyVersion, VersionId};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const RESOURCE: &str = "policy";

/// Output of a policy reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub physical_id: String,
    pub policy_arn: String,
    pub created_version: Option<VersionId>,
    /// Evicted version id, or `*` when the whole policy was removed.
    pub deleted_version: Option<String>,
}

impl From<PolicyOutcome> for LifecycleResponse {
    fn from(outcome: PolicyOutcome) -> Self {
        let data = BTreeMap::from([
            ("policyArn".to_string(), outcome.policy_arn),
            (
                "createdPolicyVersion".to_string(),
                outcome.created_version.map(|v| v.to_string()).unwrap_or_default(),
            ),
            (
                "deletedPolicyVersion".to_string(),
                outcome.deleted_version.unwrap_or_default(),
            ),
        ]);
        LifecycleResponse {
            physical_resource_id: outcome.physical_id,
            data,
        }
    }
}

/// Picks the version to evict before adding a new one.
///
/// Returns `Ok(None)` while the policy is under the version cap. At or above
/// the cap the smallest non-default id (numerically) is chosen.
pub fn select_eviction_candidate<'a>(
    policy_name: &str,
    versions: &'a [PolicyVersion],
) -> ReconcileResult<Option<&'a PolicyVersion>> {
    if versions.len() < MAX_POLICY_VERSIONS {
        return Ok(None);
    }

    versions
        .iter()
        .filter(|v| !v.is_default)
        .min_by(|a, b| a.version_id.cmp(&b.version_id))
        .map(Some)
        .ok_or_else(|| ReconcileError::EvictionInvariantViolation {
            policy_name: policy_name.to_string(),
            detail: format!("all {} retained versions are marked default", versions.len()),
        })
}

pub struct PolicyReconciler {
    actions: Arc<dyn PolicyActions>,
}

impl PolicyReconciler {
    pub fn new(actions: Arc<dyn PolicyActions>) -> Self {
        Self { actions }
    }

    pub fn physical_id(policy_name: &str) -> String {
        format!("VersionedPolicy:{policy_name}")
    }

    pub async fn create(&self, desired: &PolicyDescriptor) -> ReconcileResult<PolicyOutcome> {
        let mut stage = StageTracker::new(RESOURCE, RequestType::Create);
        stage.enter(ReconcileStage::Mutating);

        let handle = match self
            .actions
            .create_policy(&desired.policy_name, &desired.policy_document)
            .await
        {
            Ok(handle) => handle,
            Err(e) if e.is_already_exists() => {
                return Err(ReconcileError::AlreadyExists {
                    kind: RESOURCE,
                    name: desired.policy_name.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        stage.enter(ReconcileStage::Done);
        info!(policy = %desired.policy_name, arn = %handle.arn, "Created policy");

        Ok(PolicyOutcome {
            physical_id: Self::physical_id(&desired.policy_name),
            policy_arn: handle.arn,
            created_version: Some(handle.version_id),
            deleted_version: None,
        })
    }

    pub async fn update(
        &self,
        physical_id: &str,
        desired: &PolicyDescriptor,
    ) -> ReconcileResult<PolicyOutcome> {
        let name = desired.policy_name.as_str();
        let mut stage = StageTracker::new(RESOURCE, RequestType::Update);
        stage.enter(ReconcileStage::Resolving);

        if self.actions.get_policy(name).await?.is_none() {
            return Err(ReconcileError::NotFound {
                kind: RESOURCE,
                name: name.to_string(),
            });
        }

        let versions = self.actions.list_policy_versions(name).await?;
        let candidate = select_eviction_candidate(name, &versions)?.map(|v| v.version_id.clone());

        stage.enter(ReconcileStage::Mutating);
        if let Some(version_id) = &candidate {
            debug!(policy = %name, version = %version_id, retained = versions.len(), "Evicting policy version");
            self.actions.delete_policy_version(name, version_id).await?;
        }

        let handle = self
            .actions
            .create_policy_version(name, &desired.policy_document, true)
            .await?;

        stage.enter(ReconcileStage::Done);
        info!(
            policy = %name,
            created = %handle.version_id,
            evicted = ?candidate.as_ref().map(VersionId::as_str),
            "Updated policy"
        );

        Ok(PolicyOutcome {
            physical_id: physical_id.to_string(),
            policy_arn: handle.arn,
            created_version: Some(handle.version_id),
            deleted_version: candidate.map(|v| v.to_string()),
        })
    }

    pub async fn delete(
        &self,
        physical_id: &str,
        desired: &PolicyDescriptor,
    ) -> ReconcileResult<PolicyOutcome> {
        let name = desired.policy_name.as_str();
        let mut stage = StageTracker::new(RESOURCE, RequestType::Delete);
        stage.enter(ReconcileStage::Resolving);

        let versions = self.actions.list_policy_versions(name).await?;

        stage.enter(ReconcileStage::Mutating);
        for version in versions.iter().filter(|v| !v.is_default) {
            self.actions.delete_policy_version(name, &version.version_id).await?;
        }
        self.actions.delete_policy(name).await?;

        stage.enter(ReconcileStage::Done);
        info!(policy = %name, versions = versions.len(), "Deleted policy");

        Ok(PolicyOutcome {
            physical_id: physical_id.to_string(),
            policy_arn: String::new(),
            created_version: None,
            deleted_version: Some("*".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{InMemoryActions, PolicyHandle, ProviderError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn version(id: &str, is_default: bool) -> PolicyVersion {
        PolicyVersion {
            version_id: VersionId::parse(id).unwrap(),
            is_default,
        }
    }

    fn descriptor(name: &str, document: &str) -> PolicyDescriptor {
        PolicyDescriptor {
            policy_name: name.to_string(),
            policy_document: document.to_string(),
        }
    }

    fn reconciler() -> (Arc<InMemoryActions>, PolicyReconciler) {
        let actions = Arc::new(InMemoryActions::new());
        (actions.clone(), PolicyReconciler::new(actions))
    }

    #[test]
    fn no_candidate_below_cap() {
        let versions = vec![version("1", true), version("2", false)];
        assert_eq!(select_eviction_candidate("p1", &versions).unwrap(), None);
    }

    #[test]
    fn candidate_compares_numerically() {
        let versions = vec![
            version("10", false),
            version("2", false),
            version("11", true),
            version("9", false),
            version("30", false),
        ];
        let candidate = select_eviction_candidate("p1", &versions).unwrap().unwrap();
        assert_eq!(candidate.version_id.as_str(), "2");
    }

    #[test]
    fn candidate_skips_default_even_when_smallest() {
        let versions = vec![
            version("1", true),
            version("4", false),
            version("3", false),
            version("5", false),
            version("6", false),
        ];
        let candidate = select_eviction_candidate("p1", &versions).unwrap().unwrap();
        assert_eq!(candidate.version_id.as_str(), "3");
        assert!(!candidate.is_default);
    }

    #[test]
    fn all_default_violates_invariant() {
        let versions: Vec<_> = (1..=5).map(|n| version(&n.to_string(), true)).collect();
        let err = select_eviction_candidate("p1", &versions).unwrap_err();
        assert_eq!(err.code(), "EvictionInvariantViolation");
    }

    #[tokio::test]
    async fn create_returns_first_version() {
        let (actions, reconciler) = reconciler();
        let outcome = reconciler.create(&descriptor("p1", "{}")).await.unwrap();

        assert_eq!(outcome.physical_id, "VersionedPolicy:p1");
        assert_eq!(outcome.created_version.unwrap().as_str(), "1");
        assert!(outcome.policy_arn.ends_with(":policy/p1"));
        assert!(actions.policy_exists("p1"));
    }

    #[tokio::test]
    async fn create_existing_is_already_exists() {
        let (actions, reconciler) = reconciler();
        actions.seed_policy("p1", "{}", &[(1, true)]);

        let err = reconciler.create(&descriptor("p1", "{}")).await.unwrap_err();
        assert_eq!(err.code(), "AlreadyExists");
    }

    #[tokio::test]
    async fn update_at_cap_evicts_smallest_non_default() {
        let (actions, reconciler) = reconciler();
        actions.seed_policy(
            "p1",
            "{}",
            &[(1, true), (2, false), (3, false), (4, false), (5, false)],
        );

        let outcome = reconciler
            .update("VersionedPolicy:p1", &descriptor("p1", r#"{"v":6}"#))
            .await
            .unwrap();

        assert_eq!(outcome.deleted_version.as_deref(), Some("2"));
        assert_eq!(outcome.created_version.unwrap().as_str(), "6");
        assert_eq!(outcome.physical_id, "VersionedPolicy:p1");

        let versions = actions.policy_versions("p1");
        assert_eq!(versions.len(), MAX_POLICY_VERSIONS);
        let defaults: Vec<_> = versions.iter().filter(|v| v.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].version_id.as_str(), "6");
        assert_eq!(actions.policy_document("p1").as_deref(), Some(r#"{"v":6}"#));
    }

    #[tokio::test]
    async fn update_below_cap_evicts_nothing() {
        let (actions, reconciler) = reconciler();
        actions.seed_policy("p1", "{}", &[(1, false), (2, true)]);

        let outcome = reconciler
            .update("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap();

        assert_eq!(outcome.deleted_version, None);
        assert_eq!(outcome.created_version.unwrap().as_str(), "3");
        assert!(actions.calls_to("DeletePolicyVersion").is_empty());
    }

    #[tokio::test]
    async fn repeated_updates_never_exceed_cap() {
        let (actions, reconciler) = reconciler();
        reconciler.create(&descriptor("p1", "{}")).await.unwrap();

        for n in 0..8 {
            reconciler
                .update("VersionedPolicy:p1", &descriptor("p1", &format!(r#"{{"n":{n}}}"#)))
                .await
                .unwrap();
            assert!(actions.policy_versions("p1").len() <= MAX_POLICY_VERSIONS);
        }
    }

    #[tokio::test]
    async fn update_missing_policy_is_not_found() {
        let (actions, reconciler) = reconciler();

        let err = reconciler
            .update("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "NotFound");
        assert!(actions.calls_to("CreatePolicyVersion").is_empty());
        assert_eq!(actions.calls(), vec!["GetPolicy p1"]);
    }

    #[tokio::test]
    async fn update_propagates_provider_failure() {
        let (actions, reconciler) = reconciler();
        actions.seed_policy("p1", "{}", &[(1, true)]);
        actions.fail_next(
            "CreatePolicyVersion",
            ProviderError::new("CreatePolicyVersion", "throttled").with_code("ThrottlingException"),
        );

        let err = reconciler
            .update("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ProviderError");
    }

    /// Reports five versions that all claim to be the default.
    #[derive(Default)]
    struct AllDefaultVersions {
        calls: Mutex<Vec<&'static str>>,
    }

    impl AllDefaultVersions {
        fn handle(&self, name: &str) -> PolicyHandle {
            PolicyHandle {
                arn: format!("arn:aws:iot:us-east-1:000000000000:policy/{name}"),
                version_id: VersionId::parse("5").unwrap(),
            }
        }
    }

    #[async_trait]
    impl PolicyActions for AllDefaultVersions {
        fn in_region(self: Arc<Self>, _region: &str) -> Arc<dyn PolicyActions> {
            self
        }

        async fn create_policy(&self, name: &str, _document: &str) -> Result<PolicyHandle, ProviderError> {
            self.calls.lock().push("CreatePolicy");
            Ok(self.handle(name))
        }

        async fn get_policy(&self, name: &str) -> Result<Option<PolicyHandle>, ProviderError> {
            self.calls.lock().push("GetPolicy");
            Ok(Some(self.handle(name)))
        }

        async fn list_policy_versions(&self, _name: &str) -> Result<Vec<PolicyVersion>, ProviderError> {
            self.calls.lock().push("ListPolicyVersions");
            Ok((1..=5).map(|n| version(&n.to_string(), true)).collect())
        }

        async fn create_policy_version(
            &self,
            name: &str,
            _document: &str,
            _set_as_default: bool,
        ) -> Result<PolicyHandle, ProviderError> {
            self.calls.lock().push("CreatePolicyVersion");
            Ok(self.handle(name))
        }

        async fn delete_policy_version(&self, _name: &str, _version_id: &VersionId) -> Result<(), ProviderError> {
            self.calls.lock().push("DeletePolicyVersion");
            Ok(())
        }

        async fn delete_policy(&self, _name: &str) -> Result<(), ProviderError> {
            self.calls.lock().push("DeletePolicy");
            Ok(())
        }
    }

    #[tokio::test]
    async fn update_with_no_evictable_version_mutates_nothing() {
        let actions = Arc::new(AllDefaultVersions::default());
        let reconciler = PolicyReconciler::new(actions.clone());

        let err = reconciler
            .update("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "EvictionInvariantViolation");
        assert_eq!(*actions.calls.lock(), vec!["GetPolicy", "ListPolicyVersions"]);
    }

    #[tokio::test]
    async fn delete_removes_every_version() {
        let (actions, reconciler) = reconciler();
        actions.seed_policy("p1", "{}", &[(3, false), (4, true), (7, false)]);

        let outcome = reconciler
            .delete("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap();

        assert_eq!(outcome.deleted_version.as_deref(), Some("*"));
        assert!(!actions.policy_exists("p1"));
        assert_eq!(
            actions.calls_to("Delete"),
            vec![
                "DeletePolicyVersion p1@7",
                "DeletePolicyVersion p1@3",
                "DeletePolicy p1"
            ]
        );
    }

    #[tokio::test]
    async fn delete_missing_policy_propagates() {
        let (_actions, reconciler) = reconciler();
        let err = reconciler
            .delete("VersionedPolicy:p1", &descriptor("p1", "{}"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ProviderError");
    }

    #[test]
    fn outcome_maps_to_response_data() {
        let response: LifecycleResponse = PolicyOutcome {
            physical_id: "VersionedPolicy:p1".into(),
            policy_arn: "arn:p1".into(),
            created_version: VersionId::parse("6"),
            deleted_version: None,
        }
        .into();

        assert_eq!(response.data["policyArn"], "arn:p1");
        assert_eq!(response.data["createdPolicyVersion"], "6");
        assert_eq!(response.data["deletedPolicyVersion"], "");
    }
}
