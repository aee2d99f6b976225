use super::model::{
    describe_serde_error, EventOptions, LifecycleEvent, LifecycleResponse, Operation, ReconciliationRequest,
};
use super::platform_application::PlatformApplicationReconciler;
use super::policy::PolicyReconciler;
use crate::error::{ReconcileError, ReconcileResult};
use crate::infra::secrets::SecretProvider;
use crate::providers::{PlatformApplicationActions, PolicyActions, ResolvedProviders};

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Routes validated lifecycle requests to the reconciler for their kind.
pub struct Dispatcher {
    policies: Arc<dyn PolicyActions>,
    platform_applications: Arc<dyn PlatformApplicationActions>,
    secrets: Arc<dyn SecretProvider>,
}

/// Reconcilers bound to the providers for one region.
struct Reconcilers {
    policies: PolicyReconciler,
    platform_applications: PlatformApplicationReconciler,
}

impl Dispatcher {
    pub fn new(
        policies: Arc<dyn PolicyActions>,
        platform_applications: Arc<dyn PlatformApplicationActions>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            policies,
            platform_applications,
            secrets,
        }
    }

    pub fn from_providers(providers: ResolvedProviders) -> Self {
        Self::new(providers.policies, providers.platform_applications, providers.secrets)
    }

    /// Parse a JSON event body and reconcile it.
    pub async fn handle_json(&self, raw: &str) -> ReconcileResult<LifecycleResponse> {
        let event: LifecycleEvent = serde_json::from_str(raw)
            .map_err(|e| ReconcileError::validation(describe_serde_error("lifecycle event", &e)))?;
        self.handle_event(&event).await
    }

    /// Validate a raw event and reconcile it in the event's region.
    pub async fn handle_event(&self, event: &LifecycleEvent) -> ReconcileResult<LifecycleResponse> {
        let span = info_span!(
            "lifecycle_event",
            request_type = %event.request_type,
            request_id = event.request_id.as_deref().unwrap_or("-"),
            logical_id = event.logical_resource_id.as_deref().unwrap_or("-"),
            resource_type = event.resource_type.as_deref().unwrap_or("-"),
            region = tracing::field::Empty,
            debug_enabled = tracing::field::Empty,
        );

        async {
            let options = EventOptions::from_properties(&event.resource_properties)?;
            let current = tracing::Span::current();
            current.record("region", options.region.as_deref().unwrap_or("-"));
            current.record("debug_enabled", options.debug);

            let request = ReconciliationRequest::try_from(event)?;
            if options.debug {
                info!(kind = ?request.kind(), operation = %request.request_type(), "Dispatching event");
            }

            let result = self.dispatch(request, options.region.as_deref()).await;
            match &result {
                Ok(response) if options.debug => {
                    info!(physical_id = %response.physical_resource_id, data = ?response.data, "Event reconciled");
                }
                Ok(_) => {}
                Err(e) => warn!(code = e.code(), error = %e, "Reconciliation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn reconcilers(&self, region: Option<&str>) -> Reconcilers {
        let (policies, platform_applications, secrets) = match region {
            Some(region) => (
                self.policies.clone().in_region(region),
                self.platform_applications.clone().in_region(region),
                self.secrets.clone().in_region(region),
            ),
            None => (
                self.policies.clone(),
                self.platform_applications.clone(),
                self.secrets.clone(),
            ),
        };
        Reconcilers {
            policies: PolicyReconciler::new(policies),
            platform_applications: PlatformApplicationReconciler::new(platform_applications, secrets),
        }
    }

    /// Reconcile `request` against `region`, or the configured region when `None`.
    pub async fn dispatch(
        &self,
        request: ReconciliationRequest,
        region: Option<&str>,
    ) -> ReconcileResult<LifecycleResponse> {
        let reconcilers = self.reconcilers(region);
        match request {
            ReconciliationRequest::Policy(operation) => {
                let policies = &reconcilers.policies;
                let outcome = match operation {
                    Operation::Create { desired } => policies.create(&desired).await?,
                    Operation::Update {
                        physical_id,
                        desired,
                        previous: _,
                    } => policies.update(&physical_id, &desired).await?,
                    Operation::Delete { physical_id, desired } => {
                        policies.delete(&physical_id, &desired).await?
                    }
                };
                Ok(outcome.into())
            }
            ReconciliationRequest::PlatformApplication(operation) => {
                let platform_applications = &reconcilers.platform_applications;
                let outcome = match operation {
                    Operation::Create { desired } => platform_applications.create(&desired).await?,
                    Operation::Update {
                        physical_id,
                        desired,
                        previous,
                    } => {
                        platform_applications
                            .update(&physical_id, &previous, &desired)
                            .await?
                    }
                    Operation::Delete { physical_id, desired } => {
                        platform_applications.delete(&physical_id, &desired).await?
                    }
                };
                Ok(outcome.into())
            }
        }
    }
}
