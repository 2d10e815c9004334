//! Run command - start the controller and block until a shutdown signal

use std::path::{Path, PathBuf};

use chartmgr_kube::{Controller, ControllerError, Shutdown, ShutdownSignal};
use tracing::{error, info};

use crate::error::{CliError, Result};

pub async fn run(
    config_path: Option<&Path>,
    helm_bin: Option<PathBuf>,
    kube_context: Option<String>,
) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(binary) = helm_bin {
        config.helm.binary = binary;
    }
    if let Some(context) = kube_context {
        config.helm.kube_context = Some(context);
    }
    config.validate()?;

    info!(
        timeout = ?config.convergence.timeout,
        interval = ?config.convergence.interval,
        helm = %config.helm.binary.display(),
        "starting chartmanager controller"
    );

    let controller = Controller::new(config).await.map_err(|e| CliError::Startup {
        message: e.to_string(),
    })?;

    let shutdown = Shutdown::new();
    tokio::spawn(forward_signals(shutdown.clone()));

    match controller.run(shutdown.listener()).await {
        Ok(()) => Ok(()),
        Err(ControllerError::Cancelled(signal)) => {
            info!(signal = %signal, "shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "controller failed");
            Err(e.into())
        }
    }
}

/// Trigger `shutdown` on the first SIGINT or SIGTERM
async fn forward_signals(shutdown: Shutdown) {
    let signal = wait_for_signal().await;
    shutdown.trigger(signal);
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownSignal {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Sigterm,
        signal = ctrl_c() => signal,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownSignal {
    ctrl_c().await
}

async fn ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Sigint
}
