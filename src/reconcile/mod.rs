//! Reconciliation of custom-resource lifecycle events against remote state.
//!
//! Each invocation is self-contained: the reconcilers re-derive everything
//! from the action providers and keep no state between events.

pub mod credentials;
pub mod dispatcher;
pub mod model;
pub mod platform_application;
pub mod policy;

pub use dispatcher::Dispatcher;
pub use model::{
    CredentialSource, EventOptions, LifecycleEvent, LifecycleResponse, Operation, PlatformApplicationDescriptor,
    PolicyDescriptor, ReconciliationRequest, RequestType, ResourceKind,
};
pub use platform_application::{PlatformApplicationIdentity, PlatformApplicationOutcome, PlatformApplicationReconciler};
pub use policy::{select_eviction_candidate, PolicyOutcome, PolicyReconciler};

use tracing::debug;

/// Progress of a single reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReconcileStage {
    NotStarted,
    Resolving,
    Mutating,
    Done,
}

/// Forward-only stage marker; transitions are traced at debug level.
#[derive(Debug)]
pub(crate) struct StageTracker {
    resource: &'static str,
    operation: RequestType,
    stage: ReconcileStage,
}

impl StageTracker {
    pub(crate) fn new(resource: &'static str, operation: RequestType) -> Self {
        Self {
            resource,
            operation,
            stage: ReconcileStage::NotStarted,
        }
    }

    pub(crate) fn enter(&mut self, next: ReconcileStage) {
        debug_assert!(next >= self.stage, "stage moved backwards");
        debug!(
            resource = self.resource,
            operation = %self.operation,
            from = ?self.stage,
            to = ?next,
            "Reconcile stage"
        );
        self.stage = next;
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> ReconcileStage {
        self.stage
    }
}
