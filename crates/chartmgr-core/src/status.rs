//! Observed status recorded on a ChartManager after each reconciliation

use serde::{Deserialize, Serialize};

/// Release state as reported by the deployment executor
///
/// Note: This enum is non-exhaustive - new variants may be added in future versions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ReleaseState {
    #[default]
    Unknown,
    Deployed,
    Failed,
    Deleted,
    Deleting,
    Superseded,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
}

impl ReleaseState {
    /// Map a status string as printed by `helm status -o json` (Helm 2 or 3 naming)
    pub fn from_helm_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "deployed" => Self::Deployed,
            "failed" => Self::Failed,
            "deleted" | "uninstalled" => Self::Deleted,
            "deleting" | "uninstalling" => Self::Deleting,
            "superseded" => Self::Superseded,
            "pending-install" => Self::PendingInstall,
            "pending-upgrade" => Self::PendingUpgrade,
            "pending-rollback" => Self::PendingRollback,
            _ => Self::Unknown,
        }
    }

    /// Check if this is a pending (transitional) state
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall | Self::PendingUpgrade | Self::PendingRollback | Self::Deleting
        )
    }

    /// Human-readable status name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
            Self::Deleting => "deleting",
            Self::Superseded => "superseded",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recently completed reconciliation attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObservedStatus {
    /// Release state at the end of the attempt
    #[serde(default)]
    pub state: ReleaseState,

    /// Release acted upon (empty if the executor never produced one)
    #[serde(default)]
    pub release_name: String,

    /// Free-text detail: the release status on success, the error otherwise
    #[serde(default)]
    pub message: String,
}

impl ObservedStatus {
    pub fn new(
        state: ReleaseState,
        release_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            state,
            release_name: release_name.into(),
            message: message.into(),
        }
    }

    /// A failed attempt; `state` is always [`ReleaseState::Failed`]
    pub fn failed(release_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ReleaseState::Failed, release_name, message)
    }

    pub fn is_deployed(&self) -> bool {
        self.state == ReleaseState::Deployed
    }
}
