//! Error types for chartmgr-kube

use std::time::Duration;

use thiserror::Error;

use crate::shutdown::ShutdownSignal;

/// Result type for chartmgr-kube operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors that can occur while reconciling ChartManagers
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The executor failed to create or update a release
    #[error("failed to apply release '{release}': {message}")]
    Apply { release: String, message: String },

    /// The executor failed to delete a release
    #[error("failed to delete release '{release}': {message}")]
    Delete { release: String, message: String },

    /// Release did not report deployed before the deadline
    #[error("timed out waiting for release '{release}' to deploy after {timeout:?}")]
    ConvergenceTimeout { release: String, timeout: Duration },

    /// Optimistic concurrency conflict on write
    #[error("conflict writing '{resource}': the object has been modified")]
    Conflict { resource: String },

    /// Resource not found in the backing store
    #[error("chartmanager '{resource}' not found")]
    NotFound { resource: String },

    /// Helm binary could not be run
    #[error("helm error: {0}")]
    Helm(String),

    /// Controller could not start
    #[error("controller startup failed: {0}")]
    Startup(String),

    /// Controller stopped by a shutdown signal
    #[error("controller cancelled: {0}")]
    Cancelled(ShutdownSignal),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration or resource model error
    #[error(transparent)]
    Core(#[from] chartmgr_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ControllerError {
    fn from(e: serde_json::Error) -> Self {
        ControllerError::Serialization(e.to_string())
    }
}

impl ControllerError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            ControllerError::Api(kube::Error::Api(resp)) => resp.code == 404,
            ControllerError::NotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        match self {
            ControllerError::Api(kube::Error::Api(resp)) => resp.code == 409,
            ControllerError::Conflict { .. } => true,
            _ => false,
        }
    }

    /// Release named by an executor failure, if any
    pub fn release_name(&self) -> Option<&str> {
        match self {
            ControllerError::Apply { release, .. }
            | ControllerError::Delete { release, .. }
            | ControllerError::ConvergenceTimeout { release, .. } => Some(release),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> ControllerError {
        ControllerError::Api(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Conflict".to_string(),
            code,
        }))
    }

    #[test]
    fn test_conflict_detection() {
        assert!(api_error(409).is_conflict());
        assert!(!api_error(404).is_conflict());
        assert!(
            ControllerError::Conflict {
                resource: "ns/a".to_string()
            }
            .is_conflict()
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(500).is_not_found());
    }

    #[test]
    fn test_release_name() {
        let err = ControllerError::Apply {
            release: "web".to_string(),
            message: "chart not found".to_string(),
        };
        assert_eq!(err.release_name(), Some("web"));
        assert_eq!(err.to_string(), "failed to apply release 'web': chart not found");
        assert_eq!(ControllerError::Helm("x".to_string()).release_name(), None);
    }

    #[test]
    fn test_timeout_message() {
        let err = ControllerError::ConvergenceTimeout {
            release: "web".to_string(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(
            err.to_string(),
            "timed out waiting for release 'web' to deploy after 120s"
        );
    }
}
