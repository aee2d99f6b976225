//! Lifecycle-event reconcilers for resource kinds with no native
//! declarative-provisioning support: versioned IoT policies and SNS
//! platform applications.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod infra;
pub mod logging;
pub mod providers;
pub mod reconcile;

pub use error::{ReconcileError, ReconcileResult};
