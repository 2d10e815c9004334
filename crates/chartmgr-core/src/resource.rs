//! The ChartManager custom resource
//!
//! A ChartManager declares a Helm release: which chart to deploy, under which
//! release name, with which value overrides. The controller records the
//! outcome of each reconciliation on `status`.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceValidation, JSONSchemaProps,
};
use kube::{CustomResource, CustomResourceExt, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::ObservedStatus;

/// Desired state of a ChartManager
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "chartmanager.logicmonitor.com",
    version = "v1alpha1",
    kind = "ChartManager",
    plural = "chartmanagers",
    shortname = "chartmgr",
    namespaced,
    status = "ObservedStatus",
    schema = "disabled",
    derive = "PartialEq",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Release","type":"string","jsonPath":".status.releaseName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ChartManagerSpec {
    /// Chart to deploy
    pub chart: ChartRef,

    /// Release naming
    #[serde(default)]
    pub release: ReleaseSpec,

    /// Value overrides, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ValueOverride>,

    /// Only honor the initial creation of the release
    #[serde(default)]
    pub create_only: bool,
}

/// Chart reference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    /// Chart name, e.g. `stable/nginx` or `nginx` together with `repository`
    pub name: String,

    /// Pinned chart version (latest if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Chart repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Release naming; both fields default from the resource itself
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A single `name=value` override
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueOverride {
    pub name: String,
    pub value: String,
}

/// Identity of a ChartManager within the collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl ChartManager {
    /// Identity tuple of this resource
    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Release name: `spec.release.name`, falling back to the resource name
    pub fn release_name(&self) -> String {
        self.spec
            .release
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.name_any())
    }

    /// Release namespace: `spec.release.namespace`, falling back to the resource namespace
    pub fn release_namespace(&self) -> String {
        self.spec
            .release
            .namespace
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.namespace())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Copy of this resource carrying `status`; `self` is left untouched
    pub fn with_status(&self, status: ObservedStatus) -> Self {
        let mut copy = self.clone();
        copy.status = Some(status);
        copy
    }
}

/// CustomResourceDefinition for ChartManager
///
/// The spec is left schemaless (`x-kubernetes-preserve-unknown-fields`) and
/// the status subresource is not enabled: status is part of the main document
/// and is written with a plain replace.
pub fn crd() -> CustomResourceDefinition {
    let mut crd = <ChartManager as CustomResourceExt>::crd();
    for version in &mut crd.spec.versions {
        version.schema = Some(CustomResourceValidation {
            open_api_v3_schema: Some(JSONSchemaProps {
                type_: Some("object".to_string()),
                x_kubernetes_preserve_unknown_fields: Some(true),
                ..Default::default()
            }),
        });
        version.subresources = None;
    }
    crd
}

/// [`crd`] rendered as YAML
pub fn crd_yaml() -> Result<String> {
    Ok(serde_yaml::to_string(&crd())?)
}
