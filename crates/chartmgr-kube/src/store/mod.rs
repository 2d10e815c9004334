//! Backing stores for ChartManager status writes
//!
//! - **Kube** (default): replace the object through the Kubernetes API
//! - **Mock**: in-memory, for tests without a cluster

mod api;
mod mock;

pub use api::KubeStatusStore;
pub use mock::{MockStatusStore, StoreCounts};

use async_trait::async_trait;
use chartmgr_core::ChartManager;

use crate::error::Result;

/// Addressed read/replace access to ChartManager objects
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Fetch the current object
    async fn get(&self, namespace: &str, name: &str) -> Result<ChartManager>;

    /// Replace the whole object, addressed by its name and namespace.
    ///
    /// Fails with a conflict if the object changed since `resource` was read.
    async fn replace(&self, resource: &ChartManager) -> Result<ChartManager>;
}
