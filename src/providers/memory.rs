//! In-memory stand-in for the policy and platform application APIs.
//!
//! Mirrors the remote rules the reconcilers depend on: at most
//! [`MAX_POLICY_VERSIONS`] retained versions, the default version cannot be
//! deleted directly, a policy with non-default versions cannot be deleted,
//! the platform application listing is paginated, and creating a platform
//! application under an existing name and platform returns the existing ARN.

use super::{
    Attributes, PlatformApplicationActions, PlatformApplicationPage, PlatformApplicationSummary,
    PlatformKind, PolicyActions, PolicyHandle, PolicyVersion, ProviderError, VersionId,
};
use crate::config::{DEFAULT_LIST_PAGE_SIZE, MAX_POLICY_VERSIONS};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const ACCOUNT_ID: &str = "000000000000";

/// Attribute keys the listing never echoes back.
const WRITE_ONLY_ATTRIBUTES: &[&str] = &["PlatformCredential", "PlatformPrincipal"];

#[derive(Debug, Clone)]
struct StoredPolicy {
    arn: String,
    versions: BTreeMap<VersionId, String>,
    default_version: VersionId,
    next_version: u64,
}

#[derive(Debug, Clone)]
struct StoredApplication {
    arn: String,
    name: String,
    platform: PlatformKind,
    attributes: Attributes,
}

impl StoredApplication {
    fn summary(&self) -> PlatformApplicationSummary {
        let mut attributes: Attributes = self
            .attributes
            .iter()
            .filter(|(k, _)| !WRITE_ONLY_ATTRIBUTES.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        attributes.insert("Name".into(), self.name.clone());
        attributes.insert("Platform".into(), self.platform.to_string());
        attributes.entry("Enabled".into()).or_insert_with(|| "true".into());
        PlatformApplicationSummary {
            arn: Some(self.arn.clone()),
            attributes,
        }
    }
}

#[derive(Default)]
struct State {
    policies: HashMap<String, StoredPolicy>,
    applications: Vec<StoredApplication>,
    calls: Vec<String>,
    list_calls: usize,
    regions: Vec<String>,
    failures: HashMap<String, ProviderError>,
}

impl State {
    fn record(&mut self, action: &str, target: &str) -> Result<(), ProviderError> {
        self.calls.push(format!("{action} {target}"));
        match self.failures.remove(action) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn policy_mut(&mut self, action: &str, name: &str) -> Result<&mut StoredPolicy, ProviderError> {
        self.policies.get_mut(name).ok_or_else(|| policy_not_found(action, name))
    }
}

fn policy_not_found(action: &str, name: &str) -> ProviderError {
    ProviderError::new(action, format!("policy '{name}' does not exist"))
        .with_code("ResourceNotFoundException")
        .with_status(404)
}

fn version_from(n: u64) -> VersionId {
    VersionId::parse(&n.to_string()).unwrap_or_else(|| unreachable!("integers render as digits"))
}

/// Shared in-memory backend; implements both action traits.
pub struct InMemoryActions {
    region: String,
    page_size: usize,
    state: Mutex<State>,
}

impl Default for InMemoryActions {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryActions {
    pub fn new() -> Self {
        Self {
            region: "us-east-1".to_string(),
            page_size: DEFAULT_LIST_PAGE_SIZE,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make the next call of `action` fail with `error`.
    pub fn fail_next(&self, action: &str, error: ProviderError) {
        self.state.lock().failures.insert(action.to_string(), error);
    }

    /// Every call issued so far, as `"<Action> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls whose action name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Regions requested through `in_region`, in order. The fake itself
    /// serves every region from one store.
    pub fn regions(&self) -> Vec<String> {
        self.state.lock().regions.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Install a policy with exactly the given `(version, is_default)` set.
    pub fn seed_policy(&self, name: &str, document: &str, versions: &[(u64, bool)]) {
        let mut state = self.state.lock();
        let arn = self.policy_arn(name);
        let mut stored = BTreeMap::new();
        let mut default_version = version_from(1);
        for (n, is_default) in versions {
            let id = version_from(*n);
            if *is_default {
                default_version = id.clone();
            }
            stored.insert(id, document.to_string());
        }
        let next_version = versions.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
        state.policies.insert(
            name.to_string(),
            StoredPolicy {
                arn,
                versions: stored,
                default_version,
                next_version,
            },
        );
    }

    pub fn policy_exists(&self, name: &str) -> bool {
        self.state.lock().policies.contains_key(name)
    }

    /// Retained versions of a policy, oldest first.
    pub fn policy_versions(&self, name: &str) -> Vec<PolicyVersion> {
        let state = self.state.lock();
        state
            .policies
            .get(name)
            .map(|p| {
                p.versions
                    .keys()
                    .map(|id| PolicyVersion {
                        version_id: id.clone(),
                        is_default: *id == p.default_version,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn policy_document(&self, name: &str) -> Option<String> {
        let state = self.state.lock();
        let policy = state.policies.get(name)?;
        policy.versions.get(&policy.default_version).cloned()
    }

    /// Full stored attributes, including the write-only credential keys.
    pub fn application_attributes(&self, name: &str, platform: PlatformKind) -> Option<Attributes> {
        self.state
            .lock()
            .applications
            .iter()
            .find(|a| a.name == name && a.platform == platform)
            .map(|a| a.attributes.clone())
    }

    pub fn application_count(&self) -> usize {
        self.state.lock().applications.len()
    }

    fn policy_arn(&self, name: &str) -> String {
        format!("arn:aws:iot:{}:{}:policy/{}", self.region, ACCOUNT_ID, name)
    }

    fn application_arn(&self, name: &str, platform: PlatformKind) -> String {
        format!("arn:aws:sns:{}:{}:app/{}/{}", self.region, ACCOUNT_ID, platform, name)
    }
}

#[async_trait]
impl PolicyActions for InMemoryActions {
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PolicyActions> {
        self.state.lock().regions.push(region.to_string());
        self
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<PolicyHandle, ProviderError> {
        let action = "CreatePolicy";
        let arn = self.policy_arn(name);
        let mut state = self.state.lock();
        state.record(action, name)?;
        if state.policies.contains_key(name) {
            return Err(ProviderError::new(action, format!("policy '{name}' already exists"))
                .with_code("ResourceAlreadyExistsException")
                .with_status(409));
        }
        let first = version_from(1);
        state.policies.insert(
            name.to_string(),
            StoredPolicy {
                arn: arn.clone(),
                versions: BTreeMap::from([(first.clone(), document.to_string())]),
                default_version: first.clone(),
                next_version: 2,
            },
        );
        Ok(PolicyHandle {
            arn,
            version_id: first,
        })
    }

    async fn get_policy(&self, name: &str) -> Result<Option<PolicyHandle>, ProviderError> {
        let mut state = self.state.lock();
        state.record("GetPolicy", name)?;
        Ok(state.policies.get(name).map(|p| PolicyHandle {
            arn: p.arn.clone(),
            version_id: p.default_version.clone(),
        }))
    }

    async fn list_policy_versions(&self, name: &str) -> Result<Vec<PolicyVersion>, ProviderError> {
        let action = "ListPolicyVersions";
        let mut state = self.state.lock();
        state.record(action, name)?;
        let policy = state.policy_mut(action, name)?;
        // Newest first, like the remote listing.
        Ok(policy
            .versions
            .keys()
            .rev()
            .map(|id| PolicyVersion {
                version_id: id.clone(),
                is_default: *id == policy.default_version,
            })
            .collect())
    }

    async fn create_policy_version(
        &self,
        name: &str,
        document: &str,
        set_as_default: bool,
    ) -> Result<PolicyHandle, ProviderError> {
        let action = "CreatePolicyVersion";
        let mut state = self.state.lock();
        state.record(action, name)?;
        let policy = state.policy_mut(action, name)?;
        if policy.versions.len() >= MAX_POLICY_VERSIONS {
            return Err(ProviderError::new(
                action,
                format!("policy '{name}' already has {MAX_POLICY_VERSIONS} versions"),
            )
            .with_code("VersionsLimitExceededException")
            .with_status(409));
        }
        let id = version_from(policy.next_version);
        policy.next_version += 1;
        policy.versions.insert(id.clone(), document.to_string());
        if set_as_default {
            policy.default_version = id.clone();
        }
        Ok(PolicyHandle {
            arn: policy.arn.clone(),
            version_id: id,
        })
    }

    async fn delete_policy_version(&self, name: &str, version_id: &VersionId) -> Result<(), ProviderError> {
        let action = "DeletePolicyVersion";
        let mut state = self.state.lock();
        state.record(action, &format!("{name}@{version_id}"))?;
        let policy = state.policy_mut(action, name)?;
        if *version_id == policy.default_version {
            return Err(ProviderError::new(
                action,
                format!("version {version_id} is the default version of '{name}'"),
            )
            .with_code("DeleteConflictException")
            .with_status(409));
        }
        if policy.versions.remove(version_id).is_none() {
            return Err(ProviderError::new(action, format!("version {version_id} of '{name}' does not exist"))
                .with_code("ResourceNotFoundException")
                .with_status(404));
        }
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> Result<(), ProviderError> {
        let action = "DeletePolicy";
        let mut state = self.state.lock();
        state.record(action, name)?;
        let policy = state.policy_mut(action, name)?;
        if policy.versions.len() > 1 {
            return Err(ProviderError::new(
                action,
                format!("policy '{name}' still has non-default versions"),
            )
            .with_code("DeleteConflictException")
            .with_status(409));
        }
        state.policies.remove(name);
        Ok(())
    }
}

#[async_trait]
impl PlatformApplicationActions for InMemoryActions {
    fn in_region(self: Arc<Self>, region: &str) -> Arc<dyn PlatformApplicationActions> {
        self.state.lock().regions.push(region.to_string());
        self
    }

    async fn create_platform_application(
        &self,
        name: &str,
        platform: PlatformKind,
        attributes: &Attributes,
    ) -> Result<String, ProviderError> {
        let arn = self.application_arn(name, platform);
        let mut state = self.state.lock();
        state.record("CreatePlatformApplication", name)?;
        if let Some(existing) = state
            .applications
            .iter_mut()
            .find(|a| a.name == name && a.platform == platform)
        {
            existing.attributes = attributes.clone();
            return Ok(existing.arn.clone());
        }
        state.applications.push(StoredApplication {
            arn: arn.clone(),
            name: name.to_string(),
            platform,
            attributes: attributes.clone(),
        });
        Ok(arn)
    }

    async fn list_platform_applications(
        &self,
        next_token: Option<&str>,
    ) -> Result<PlatformApplicationPage, ProviderError> {
        let action = "ListPlatformApplications";
        let mut state = self.state.lock();
        state.record(action, next_token.unwrap_or("-"))?;
        state.list_calls += 1;
        let start = match next_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                ProviderError::new(action, format!("invalid NextToken '{token}'"))
                    .with_code("InvalidParameter")
                    .with_status(400)
            })?,
        };
        let end = (start + self.page_size).min(state.applications.len());
        let applications = state
            .applications
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(StoredApplication::summary)
            .collect();
        let next_token = (end < state.applications.len()).then(|| end.to_string());
        Ok(PlatformApplicationPage {
            applications,
            next_token,
        })
    }

    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> Result<(), ProviderError> {
        let action = "SetPlatformApplicationAttributes";
        let mut state = self.state.lock();
        state.record(action, arn)?;
        let app = state
            .applications
            .iter_mut()
            .find(|a| a.arn == arn)
            .ok_or_else(|| {
                ProviderError::new(action, format!("platform application '{arn}' does not exist"))
                    .with_code("NotFound")
                    .with_status(404)
            })?;
        app.attributes.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.record("DeletePlatformApplication", arn)?;
        state.applications.retain(|a| a.arn != arn);
        Ok(())
    }
}
