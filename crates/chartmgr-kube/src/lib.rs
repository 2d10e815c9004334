//! chartmgr Kube - Reconciliation engine for ChartManager resources
//!
//! This crate provides:
//! - **Watch Dispatch**: Turn the ChartManager watch into add/update/delete events and fan them out
//! - **Per-Resource Ordering**: Optional single-worker queue per resource identity
//! - **Reconcile Handlers**: Apply releases, wait for convergence, record the outcome
//! - **Executors**: Helm CLI adapter and an in-memory mock behind one trait
//! - **Status Writes**: Copy-on-write status replacement with opt-in conflict retry
//! - **Lifecycle**: Controller startup and signal-driven shutdown

pub mod controller;
pub mod convergence;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod executor;
pub mod handlers;
pub mod queue;
pub mod shutdown;
pub mod status;
pub mod store;

pub use controller::{Controller, connect, watch_events};
pub use convergence::{ConvergenceWaiter, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
pub use dispatcher::{DispatchStats, Dispatcher, StopReason};
pub use error::{ControllerError, Result};
pub use event::{ChangeTracker, Event};
pub use executor::{
    ExecutorCounts, HelmExecutor, HelmRelease, MockExecutor, MockRelease, ReleaseExecutor,
    ReleaseHandle,
};
pub use handlers::{Outcome, Reconciler};
pub use queue::IdentityQueue;
pub use shutdown::{Shutdown, ShutdownListener, ShutdownSignal};
pub use status::StatusWriter;
pub use store::{KubeStatusStore, MockStatusStore, StatusStore, StoreCounts};
