//! Status writes
//!
//! The writer never mutates the caller's object: it replaces a copy carrying
//! the new status. A failed write is logged and returned, never retried,
//! unless conflict retries are enabled. In that case a 409 triggers a
//! read-modify-write on the latest version of the object.

use chartmgr_core::{ChartManager, ObservedStatus};
use kube::ResourceExt;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::store::StatusStore;

/// Writes [`ObservedStatus`] back onto ChartManagers
pub struct StatusWriter<S> {
    store: S,
    conflict_retries: u32,
}

impl<S: StatusStore> StatusWriter<S> {
    /// Best-effort writer: one replace per write
    pub fn new(store: S) -> Self {
        Self {
            store,
            conflict_retries: 0,
        }
    }

    /// Retry up to `retries` times when a write conflicts
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Get the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace `resource` with a copy carrying `status`
    pub async fn write(
        &self,
        resource: &ChartManager,
        status: ObservedStatus,
    ) -> Result<ChartManager> {
        let id = resource.id();
        debug!(
            resource = %id,
            state = %status.state,
            release = %status.release_name,
            "updating chartmanager status"
        );

        let mut target = resource.with_status(status.clone());
        let mut attempt = 0;
        loop {
            match self.store.replace(&target).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(resource = %id, attempt, "status write conflicted, retrying on latest version");
                    let latest = self
                        .store
                        .get(&target.namespace().unwrap_or_default(), &target.name_any())
                        .await
                        .inspect_err(|e| {
                            error!(resource = %id, error = %e, "failed to update status");
                        })?;
                    target = latest.with_status(status.clone());
                }
                Err(e) => {
                    error!(resource = %id, error = %e, "failed to update status");
                    return Err(e);
                }
            }
        }
    }
}
