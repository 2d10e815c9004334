//! Controller configuration
//!
//! Read from `~/.config/chartmgr/config.yaml` (or an explicit path). Every
//! field has a default, so an empty or missing file yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Controller configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Release convergence polling
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Run handlers for the same ChartManager one at a time, in delivery order
    #[serde(default = "default_true")]
    pub serialize_per_resource: bool,

    /// Read-modify-write retries when a status write hits a conflict (0 = best effort)
    #[serde(default)]
    pub status_conflict_retries: u32,

    /// How long to wait for in-flight handlers after shutdown (0 = don't wait)
    #[serde(default, with = "humantime_serde")]
    pub shutdown_grace_period: Duration,

    /// Helm executor settings
    #[serde(default)]
    pub helm: HelmConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            convergence: ConvergenceConfig::default(),
            serialize_per_resource: true,
            status_conflict_retries: 0,
            shutdown_grace_period: Duration::ZERO,
            helm: HelmConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Release convergence polling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceConfig {
    /// Give up waiting for the release to deploy after this long (default: 2m)
    #[serde(default = "default_convergence_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Interval between readiness checks (default: 30s)
    #[serde(default = "default_convergence_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            timeout: default_convergence_timeout(),
            interval: default_convergence_interval(),
        }
    }
}

fn default_convergence_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_convergence_interval() -> Duration {
    Duration::from_secs(30)
}

/// Helm executor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelmConfig {
    /// Path to the helm binary
    #[serde(default = "default_helm_binary")]
    pub binary: PathBuf,

    /// kubeconfig context passed as `--kube-context`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            kube_context: None,
        }
    }
}

fn default_helm_binary() -> PathBuf {
    PathBuf::from("helm")
}

impl ControllerConfig {
    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get default configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chartmgr").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.convergence.interval.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "convergence.interval must be greater than zero".to_string(),
            });
        }
        if self.convergence.timeout.is_zero() {
            return Err(CoreError::InvalidConfig {
                message: "convergence.timeout must be greater than zero".to_string(),
            });
        }
        if self.helm.binary.as_os_str().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "helm.binary must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
