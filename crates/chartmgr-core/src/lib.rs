//! chartmgr Core - Core types for the ChartManager controller
//!
//! This crate provides the foundational types used throughout chartmgr:
//! - `ChartManager`: The custom resource declaring a desired Helm release
//! - `ObservedStatus`: The outcome recorded back onto the resource
//! - `ReleaseState`: Release status as reported by the deployment executor
//! - `ControllerConfig`: Controller configuration with defaults

pub mod config;
pub mod error;
pub mod resource;
pub mod status;

pub use config::{ControllerConfig, ConvergenceConfig, HelmConfig};
pub use error::{CoreError, Result};
pub use resource::{
    ChartManager, ChartManagerSpec, ChartRef, ReleaseSpec, ResourceId, ValueOverride, crd,
    crd_yaml,
};
pub use status::{ObservedStatus, ReleaseState};
