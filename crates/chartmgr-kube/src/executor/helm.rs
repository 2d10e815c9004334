//! Helm CLI executor
//!
//! Releases are applied with `helm upgrade --install` and removed with
//! `helm uninstall`. Readiness is read from `helm status --output json`, so a
//! handle always reports the live release state rather than a snapshot.

use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use chartmgr_core::{ChartManager, HelmConfig, ReleaseState};
use tokio::process::Command;
use tracing::{debug, info};

use super::{ReleaseExecutor, ReleaseHandle};
use crate::error::{ControllerError, Result};

#[derive(Debug)]
struct HelmCli {
    binary: PathBuf,
    kube_context: Option<String>,
}

impl HelmCli {
    async fn run(&self, args: &[String]) -> Result<Output> {
        let mut cmd = Command::new(&self.binary);
        if let Some(context) = &self.kube_context {
            cmd.arg("--kube-context").arg(context);
        }
        debug!(binary = %self.binary.display(), args = ?args, "running helm");
        cmd.args(args)
            .output()
            .await
            .map_err(|e| ControllerError::Helm(format!("failed to run {}: {}", self.binary.display(), e)))
    }

    /// Current state of `release`, or `None` if helm reports it does not exist
    async fn lookup(&self, release: &str, namespace: &str) -> Result<Option<ReleaseState>> {
        let args = [
            "status".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let output = self.run(&args).await?;
        if output.status.success() {
            return parse_status(&output.stdout).map(Some);
        }
        if is_release_not_found(&output) {
            return Ok(None);
        }
        Err(ControllerError::Helm(failure_message(&output)))
    }

    async fn status(&self, release: &str, namespace: &str) -> Result<ReleaseState> {
        Ok(self.lookup(release, namespace).await?.unwrap_or_default())
    }
}

/// Executor backed by the `helm` binary
#[derive(Debug, Clone)]
pub struct HelmExecutor {
    cli: Arc<HelmCli>,
}

impl HelmExecutor {
    /// Create an executor without probing the binary
    pub fn new(config: &HelmConfig) -> Self {
        Self {
            cli: Arc::new(HelmCli {
                binary: config.binary.clone(),
                kube_context: config.kube_context.clone(),
            }),
        }
    }

    /// Create an executor and verify that helm can be run
    pub async fn connect(config: &HelmConfig) -> Result<Self> {
        let executor = Self::new(config);
        let output = executor
            .cli
            .run(&["version".to_string(), "--short".to_string()])
            .await
            .map_err(|e| ControllerError::Startup(e.to_string()))?;
        if !output.status.success() {
            return Err(ControllerError::Startup(format!(
                "helm version check failed: {}",
                failure_message(&output)
            )));
        }
        info!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "connected to helm"
        );
        Ok(executor)
    }

    fn handle(&self, name: String, namespace: String) -> HelmRelease {
        HelmRelease {
            name,
            namespace,
            cli: Arc::clone(&self.cli),
        }
    }
}

#[async_trait]
impl ReleaseExecutor for HelmExecutor {
    async fn create_or_update(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>> {
        let release = resource.release_name();
        let namespace = resource.release_namespace();

        if resource.spec.chart.name.trim().is_empty() {
            return Err(ControllerError::Apply {
                release,
                message: format!("chartmanager '{}' has no spec.chart.name", resource.id()),
            });
        }

        if self.is_create_only(resource) {
            // Only a definite "not found" may lead to an install
            match self.cli.lookup(&release, &namespace).await {
                Ok(Some(state)) => {
                    debug!(
                        release = %release,
                        state = %state,
                        "release exists, create-only mode leaves it untouched"
                    );
                    return Ok(Box::new(self.handle(release, namespace)));
                }
                Ok(None) => debug!(release = %release, "release not found, installing"),
                Err(e) => {
                    return Err(ControllerError::Apply {
                        release,
                        message: format!("cannot tell whether the release exists: {}", e),
                    });
                }
            }
        }

        let output = self
            .cli
            .run(&upgrade_args(resource))
            .await
            .map_err(|e| ControllerError::Apply {
                release: release.clone(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ControllerError::Apply {
                release,
                message: failure_message(&output),
            });
        }

        info!(release = %release, namespace = %namespace, "release applied");
        Ok(Box::new(self.handle(release, namespace)))
    }

    async fn delete(&self, resource: &ChartManager) -> Result<Box<dyn ReleaseHandle>> {
        let release = resource.release_name();
        let namespace = resource.release_namespace();

        let output = self
            .cli
            .run(&uninstall_args(resource))
            .await
            .map_err(|e| ControllerError::Delete {
                release: release.clone(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ControllerError::Delete {
                release,
                message: failure_message(&output),
            });
        }

        info!(release = %release, namespace = %namespace, "release uninstalled");
        Ok(Box::new(self.handle(release, namespace)))
    }
}

/// Handle to a release managed through the helm binary
#[derive(Debug, Clone)]
pub struct HelmRelease {
    name: String,
    namespace: String,
    cli: Arc<HelmCli>,
}

impl HelmRelease {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl ReleaseHandle for HelmRelease {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> ReleaseState {
        match self.cli.status(&self.name, &self.namespace).await {
            Ok(state) => state,
            Err(e) => {
                debug!(release = %self.name, error = %e, "could not read release status");
                ReleaseState::Unknown
            }
        }
    }
}

/// Arguments for `helm upgrade --install` of `resource`
pub fn upgrade_args(resource: &ChartManager) -> Vec<String> {
    let spec = &resource.spec;
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        resource.release_name(),
        spec.chart.name.clone(),
        "--namespace".to_string(),
        resource.release_namespace(),
    ];
    if let Some(version) = spec.chart.version.as_ref().filter(|v| !v.is_empty()) {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if let Some(repo) = spec.chart.repository.as_ref().filter(|r| !r.is_empty()) {
        args.push("--repo".to_string());
        args.push(repo.clone());
    }
    for value in &spec.values {
        args.push("--set".to_string());
        args.push(format!("{}={}", value.name, value.value));
    }
    args
}

/// Arguments for `helm uninstall` of `resource`
pub fn uninstall_args(resource: &ChartManager) -> Vec<String> {
    vec![
        "uninstall".to_string(),
        resource.release_name(),
        "--namespace".to_string(),
        resource.release_namespace(),
    ]
}

fn parse_status(stdout: &[u8]) -> Result<ReleaseState> {
    let value: serde_json::Value = serde_json::from_slice(stdout)?;
    Ok(value
        .pointer("/info/status")
        .and_then(|s| s.as_str())
        .map(ReleaseState::from_helm_status)
        .unwrap_or_default())
}

fn is_release_not_found(output: &Output) -> bool {
    String::from_utf8_lossy(&output.stderr).contains("release: not found")
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("helm exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}
