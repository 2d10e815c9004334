//! Deployment-action executors
//!
//! The reconciler only depends on the contract defined here:
//! - **Idempotent apply**: `create_or_update` converges a release towards the spec
//! - **Queryable status**: a [`ReleaseHandle`] reports the release state on demand
//! - **Queryable readiness**: [`ReleaseHandle::deployed`]
//!
//! Two implementations are provided:
//! - [`HelmExecutor`]: drives the `helm` binary
//! - [`MockExecutor`]: in-memory, for tests

mod helm;
mod mock;

pub use helm::{HelmExecutor, HelmRelease, uninstall_args, upgrade_args};
pub use mock::{ExecutorCounts, MockExecutor, MockRelease};

use async_trait::async_trait;
use chartmgr_core::{ChartManager, ReleaseState};

use crate::error::Result;

/// One release as produced by a single executor call
///
/// Owned by the reconciliation task that requested it.
#[async_trait]
pub trait ReleaseHandle: Send + Sync + std::fmt::Debug {
    /// Release name
    fn name(&self) -> &str;

    /// Current release state as reported by the executor
    async fn status(&self) -> ReleaseState;

    /// Whether the release has converged
    async fn deployed(&self) -> bool {
        self.status().await == ReleaseState::Deployed
    }
}

/// Executor that materializes ChartManagers as releases
///
/// Implementations must be Send + Sync: a single executor is shared by every
/// in-flight reconciliation task.
#[async_trait]
pub trait ReleaseExecutor: Send + Sync {
    /// Install the release, or upgrade it if it already exists.
    ///
    /// Failures should be reported as [`ControllerError::Apply`](crate::ControllerError::Apply)
    /// so the release name survives into the recorded status.
    async fn create_or_update(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>>;

    /// Remove the release backing `resource`
    async fn delete(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>>;

    /// Whether `resource` only wants its release created, never updated
    fn is_create_only(&self, resource: &ChartManager) -> bool {
        resource.spec.create_only
    }
}
