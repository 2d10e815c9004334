//! Mock executor for testing
//!
//! Keeps releases in memory and lets tests script failures and how many
//! readiness checks a release needs before it reports deployed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use chartmgr_core::{ChartManager, ReleaseState, ResourceId};

use super::{ReleaseExecutor, ReleaseHandle};
use crate::error::{ControllerError, Result};

/// In-memory executor for testing
#[derive(Clone)]
pub struct MockExecutor {
    state: Arc<RwLock<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Installed releases: resource -> release name
    releases: HashMap<ResourceId, String>,
    /// Readiness checks a new handle answers `false` to
    ready_after: u32,
    apply_error: Option<String>,
    delete_error: Option<String>,
    /// Resources passed to `create_or_update`, in call order
    applied: Vec<ResourceId>,
    counts: ExecutorCounts,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct ExecutorCounts {
    pub applies: usize,
    pub deletes: usize,
    pub readiness_checks: usize,
}

impl MockExecutor {
    /// Executor whose releases are deployed on the first check
    pub fn new() -> Self {
        Self::ready_after(0)
    }

    /// Executor whose releases answer `false` to the first `checks` readiness checks
    pub fn ready_after(checks: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                ready_after: checks,
                ..Default::default()
            })),
        }
    }

    /// Executor whose releases never become ready
    pub fn never_ready() -> Self {
        Self::ready_after(u32::MAX)
    }

    /// Fail every subsequent `create_or_update` with `message`
    pub fn fail_apply(&self, message: impl Into<String>) {
        self.state.write().unwrap().apply_error = Some(message.into());
    }

    /// Fail every subsequent `delete` with `message`
    pub fn fail_delete(&self, message: impl Into<String>) {
        self.state.write().unwrap().delete_error = Some(message.into());
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> ExecutorCounts {
        self.state.read().unwrap().counts.clone()
    }

    /// Resources passed to `create_or_update`, in call order
    pub fn applied(&self) -> Vec<ResourceId> {
        self.state.read().unwrap().applied.clone()
    }

    /// Whether a release currently exists for `id`
    pub fn has_release(&self, id: &ResourceId) -> bool {
        self.state.read().unwrap().releases.contains_key(id)
    }

    fn handle(&self, name: String, ready_after: u32, ready_state: ReleaseState) -> MockRelease {
        MockRelease {
            name,
            ready_after,
            ready_state,
            checks: AtomicU32::new(0),
            executor: Arc::clone(&self.state),
        }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseExecutor for MockExecutor {
    async fn create_or_update(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>> {
        let id = resource.id();
        let release = resource.release_name();
        let create_only = self.is_create_only(resource);

        let ready_after = {
            let mut state = self.state.write().unwrap();
            state.counts.applies += 1;
            state.applied.push(id.clone());

            if let Some(message) = state.apply_error.clone() {
                return Err(ControllerError::Apply { release, message });
            }

            if create_only && state.releases.contains_key(&id) {
                // Existing release is left as is and is already converged
                0
            } else {
                state.releases.insert(id, release.clone());
                state.ready_after
            }
        };

        Ok(Box::new(self.handle(release, ready_after, ReleaseState::Deployed)))
    }

    async fn delete(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>> {
        let release = resource.release_name();
        {
            let mut state = self.state.write().unwrap();
            state.counts.deletes += 1;

            if let Some(message) = state.delete_error.clone() {
                return Err(ControllerError::Delete { release, message });
            }
            state.releases.remove(&resource.id());
        }

        Ok(Box::new(self.handle(release, 0, ReleaseState::Deleted)))
    }
}

/// Release handle produced by [`MockExecutor`]
#[derive(Debug)]
pub struct MockRelease {
    name: String,
    ready_after: u32,
    ready_state: ReleaseState,
    checks: AtomicU32,
    executor: Arc<RwLock<MockState>>,
}

impl MockRelease {
    /// Readiness checks answered so far
    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    fn is_ready(&self, checks: u32) -> bool {
        checks > self.ready_after
    }
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("releases", &self.releases.len())
            .field("counts", &self.counts)
            .finish()
    }
}

#[async_trait]
impl ReleaseHandle for MockRelease {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> ReleaseState {
        if self.is_ready(self.checks()) {
            self.ready_state
        } else {
            ReleaseState::PendingInstall
        }
    }

    async fn deployed(&self) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.executor.write().unwrap().counts.readiness_checks += 1;
        self.is_ready(checks)
    }
}
