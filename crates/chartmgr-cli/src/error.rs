//! CLI error types

use miette::Diagnostic;
use thiserror::Error;

use chartmgr_core::CoreError;
use chartmgr_kube::ControllerError;

/// Errors reported by chartmgr commands
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartmgr::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The controller could not start
    #[error("Startup failed: {message}")]
    #[diagnostic(
        code(chartmgr::cli::startup),
        help("check that the cluster is reachable and the helm binary is installed")
    )]
    Startup { message: String },

    /// The controller stopped with an error
    #[error("Controller error: {0}")]
    #[diagnostic(code(chartmgr::cli::controller))]
    Controller(#[from] ControllerError),

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartmgr::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::Config {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
