//! Status store backed by the Kubernetes API

use async_trait::async_trait;
use chartmgr_core::ChartManager;
use kube::ResourceExt;
use kube::api::{Api, PostParams};

use super::StatusStore;
use crate::error::Result;

/// Writes ChartManagers with a plain `PUT` on the main resource
#[derive(Clone)]
pub struct KubeStatusStore {
    client: kube::Client,
}

impl KubeStatusStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ChartManager> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl StatusStore for KubeStatusStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ChartManager> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn replace(&self, resource: &ChartManager) -> Result<ChartManager> {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        Ok(self
            .api(&namespace)
            .replace(&name, &PostParams::default(), resource)
            .await?)
    }
}
