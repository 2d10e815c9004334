//! CLI commands

pub mod config;
pub mod crd;
pub mod run;

use std::path::Path;

use chartmgr_core::ControllerConfig;

use crate::error::{CliError, Result};

/// Load `path` if given, else the default config file, else defaults
pub fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::load_from(path).map_err(|e| match e {
            chartmgr_core::CoreError::Io(io) => CliError::config_with_help(
                format!("cannot read {}: {}", path.display(), io),
                "pass an existing file with --config, or omit it to use defaults",
            ),
            other => other.into(),
        }),
        None => Ok(ControllerConfig::load()?),
    }
}
