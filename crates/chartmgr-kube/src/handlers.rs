//! Add/update/delete handling for ChartManagers
//!
//! Added and updated resources are applied with the executor, waited on until
//! the release converges, and the outcome is written to `status`. Deleted
//! resources only have their release removed: there is no object left to
//! write a status to.

use chartmgr_core::{ChartManager, ObservedStatus, ReleaseState};
use tracing::{error, info, warn};

use crate::convergence::ConvergenceWaiter;
use crate::error::{ControllerError, Result};
use crate::event::Event;
use crate::executor::{ReleaseExecutor, ReleaseHandle};
use crate::status::StatusWriter;
use crate::store::StatusStore;

/// What a handler did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Release applied, converged, and status written (or the write was abandoned)
    Reconciled { release: String, state: ReleaseState },
    /// Create-only resource updated: release applied, status left alone
    CreateOnlySkipped { release: String },
    /// Release removed
    Deleted { release: String },
}

/// Reconciles ChartManager events against the executor and the status store
pub struct Reconciler<E, S> {
    executor: E,
    writer: StatusWriter<S>,
    waiter: ConvergenceWaiter,
}

impl<E: ReleaseExecutor, S: StatusStore> Reconciler<E, S> {
    pub fn new(executor: E, writer: StatusWriter<S>, waiter: ConvergenceWaiter) -> Self {
        Self {
            executor,
            writer,
            waiter,
        }
    }

    /// Get the executor
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Get the status writer
    pub fn writer(&self) -> &StatusWriter<S> {
        &self.writer
    }

    /// Route an event to its handler; failures end here, logged
    pub async fn handle(&self, event: Event) {
        let id = event.id();
        let kind = event.kind();
        let result = match event {
            Event::Added(resource) => self.on_added(&resource).await,
            Event::Updated(old, new) => self.on_updated(&old, &new).await,
            Event::Deleted(resource) => self.on_deleted(&resource).await,
        };
        if let Err(e) = result {
            error!(resource = %id, event = kind, error = %e, "reconciliation failed");
        }
    }

    /// Create or update the release for a newly seen resource
    pub async fn on_added(&self, resource: &ChartManager) -> Result<Outcome> {
        let release = self.apply(resource).await?;
        let outcome = self.finish(resource, release.as_ref()).await?;
        info!(resource = %resource.id(), release = %release.name(), "created chartmanager");
        Ok(outcome)
    }

    /// Re-apply the release for a changed resource
    pub async fn on_updated(&self, _old: &ChartManager, new: &ChartManager) -> Result<Outcome> {
        let release = self.apply(new).await?;

        if self.executor.is_create_only(new) {
            info!(
                resource = %new.id(),
                release = %release.name(),
                "create-only mode, ignoring update of chartmanager"
            );
            return Ok(Outcome::CreateOnlySkipped {
                release: release.name().to_string(),
            });
        }

        let outcome = self.finish(new, release.as_ref()).await?;
        info!(resource = %new.id(), release = %release.name(), "updated chartmanager");
        Ok(outcome)
    }

    /// Remove the release of a deleted resource
    pub async fn on_deleted(&self, resource: &ChartManager) -> Result<Outcome> {
        let release = self.executor.delete(resource).await.inspect_err(|e| {
            error!(resource = %resource.id(), error = %e, "failed to delete chartmanager release");
        })?;
        info!(resource = %resource.id(), release = %release.name(), "deleted chartmanager");
        Ok(Outcome::Deleted {
            release: release.name().to_string(),
        })
    }

    /// Run the executor; on failure record it on the resource
    async fn apply(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>> {
        let result = match check_chart(resource) {
            Ok(()) => self.executor.create_or_update(resource).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(release) => Ok(release),
            Err(e) => {
                error!(resource = %resource.id(), error = %e, "failed to apply chartmanager release");
                let status = ObservedStatus::failed(e.release_name().unwrap_or_default(), e.to_string());
                // Write failures are logged by the writer
                let _ = self.writer.write(resource, status).await;
                Err(e)
            }
        }
    }

    /// Wait for convergence, then record the outcome
    async fn finish(&self, resource: &ChartManager, release: &dyn ReleaseHandle) -> Result<Outcome> {
        let id = resource.id();
        match self.waiter.wait(release).await {
            Ok(()) => {
                let state = release.status().await;
                info!(resource = %id, release = %release.name(), state = %state, "release converged");
                let status = ObservedStatus::new(state, release.name(), state.to_string());
                let _ = self.writer.write(resource, status).await;
                Ok(Outcome::Reconciled {
                    release: release.name().to_string(),
                    state,
                })
            }
            Err(e) => {
                warn!(
                    resource = %id,
                    release = %release.name(),
                    error = %e,
                    "failed to verify that release deployed"
                );
                let status = ObservedStatus::failed(release.name(), e.to_string());
                let _ = self.writer.write(resource, status).await;
                Err(e)
            }
        }
    }
}

/// A resource without a chart name cannot be handed to the executor
fn check_chart(resource: &ChartManager) -> Result<()> {
    if resource.spec.chart.name.trim().is_empty() {
        return Err(ControllerError::Apply {
            release: resource.release_name(),
            message: format!("chartmanager '{}' has no spec.chart.name", resource.id()),
        });
    }
    Ok(())
}
