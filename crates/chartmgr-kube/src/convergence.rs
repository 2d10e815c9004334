//! Release convergence wait
//!
//! Polls a [`ReleaseHandle`] at a constant interval until it reports deployed
//! or the deadline passes. The first check happens immediately. At every wake
//! readiness is checked before the deadline, so a release that becomes ready
//! on the tick that coincides with the deadline counts as converged.

use std::time::Duration;

use chartmgr_core::ConvergenceConfig;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::{ControllerError, Result};
use crate::executor::ReleaseHandle;

/// Default deadline for a release to deploy (2 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between readiness checks (30 seconds)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Waits for releases to report deployed
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceWaiter {
    timeout: Duration,
    interval: Duration,
}

impl ConvergenceWaiter {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block the calling task until `release` is deployed or the deadline passes
    pub async fn wait(&self, release: &dyn ReleaseHandle) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            debug!(release = %release.name(), "checking status of release");
            if release.deployed().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ControllerError::ConvergenceTimeout {
                    release: release.name().to_string(),
                    timeout: self.timeout,
                });
            }
        }
    }
}

impl Default for ConvergenceWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_INTERVAL)
    }
}

impl From<ConvergenceConfig> for ConvergenceWaiter {
    fn from(config: ConvergenceConfig) -> Self {
        Self::new(config.timeout, config.interval)
    }
}
