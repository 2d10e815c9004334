//! Mock status store for testing
//!
//! This store keeps ChartManagers in memory, useful for unit tests
//! without requiring a Kubernetes cluster. It enforces optimistic concurrency
//! on `metadata.resourceVersion` the way the API server does.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chartmgr_core::{ChartManager, ResourceId};

use super::StatusStore;
use crate::error::{ControllerError, Result};

/// In-memory status store for testing
#[derive(Clone, Default)]
pub struct MockStatusStore {
    /// Storage: identity -> current object
    store: Arc<RwLock<HashMap<ResourceId, ChartManager>>>,
    /// Successful replaces, in order
    writes: Arc<RwLock<Vec<ChartManager>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<StoreCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct StoreCounts {
    pub gets: usize,
    pub replaces: usize,
    pub conflicts: usize,
}

impl MockStatusStore {
    /// Create a new empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated resources
    ///
    /// Resources without a resourceVersion are stored at version "1".
    pub fn with_resources(resources: Vec<ChartManager>) -> Self {
        let store = Self::new();
        {
            let mut objects = store.store.write().unwrap();
            for mut resource in resources {
                if resource.metadata.resource_version.is_none() {
                    resource.metadata.resource_version = Some("1".to_string());
                }
                objects.insert(resource.id(), resource);
            }
        }
        store
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> StoreCounts {
        self.operations.read().unwrap().clone()
    }

    /// Successful replaces, in order
    pub fn writes(&self) -> Vec<ChartManager> {
        self.writes.read().unwrap().clone()
    }

    /// Current stored object
    pub fn current(&self, id: &ResourceId) -> Option<ChartManager> {
        self.store.read().unwrap().get(id).cloned()
    }

    /// Simulate a concurrent writer: bump the stored resourceVersion
    pub fn touch(&self, id: &ResourceId) {
        if let Some(resource) = self.store.write().unwrap().get_mut(id) {
            resource.metadata.resource_version =
                Some(next_version(resource.metadata.resource_version.as_deref()));
        }
    }

    /// Simulate deletion of the object
    pub fn remove(&self, id: &ResourceId) -> Option<ChartManager> {
        self.store.write().unwrap().remove(id)
    }
}

fn next_version(current: Option<&str>) -> String {
    current
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(1, |v| v.saturating_add(1))
        .to_string()
}

#[async_trait]
impl StatusStore for MockStatusStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ChartManager> {
        self.operations.write().unwrap().gets += 1;

        let id = ResourceId::new(namespace, name);
        self.store
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound {
                resource: id.to_string(),
            })
    }

    async fn replace(&self, resource: &ChartManager) -> Result<ChartManager> {
        self.operations.write().unwrap().replaces += 1;

        let id = resource.id();
        let mut store = self.store.write().unwrap();
        let current = store.get(&id).ok_or_else(|| ControllerError::NotFound {
            resource: id.to_string(),
        })?;

        // A missing resourceVersion is an unconditional update
        if let Some(expected) = &resource.metadata.resource_version {
            if current.metadata.resource_version.as_ref() != Some(expected) {
                self.operations.write().unwrap().conflicts += 1;
                return Err(ControllerError::Conflict {
                    resource: id.to_string(),
                });
            }
        }

        let mut updated = resource.clone();
        updated.metadata.resource_version =
            Some(next_version(current.metadata.resource_version.as_deref()));
        store.insert(id, updated.clone());
        self.writes.write().unwrap().push(updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartmgr_core::{ChartManagerSpec, ObservedStatus, ReleaseState};

    fn resource(name: &str) -> ChartManager {
        let mut cm = ChartManager::new(name, ChartManagerSpec::default());
        cm.metadata.namespace = Some("default".to_string());
        cm
    }

    #[tokio::test]
    async fn test_replace_bumps_version() {
        let store = MockStatusStore::with_resources(vec![resource("a")]);
        let current = store.get("default", "a").await.unwrap();
        assert_eq!(current.metadata.resource_version.as_deref(), Some("1"));

        let updated = store
            .replace(&current.with_status(ObservedStatus::new(ReleaseState::Deployed, "a", "ok")))
            .await
            .unwrap();
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MockStatusStore::with_resources(vec![resource("a")]);
        let stale = store.get("default", "a").await.unwrap();
        store.touch(&stale.id());

        let err = store.replace(&stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.operation_counts().conflicts, 1);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_replace_missing_object() {
        let store = MockStatusStore::new();
        let err = store.replace(&resource("gone")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
