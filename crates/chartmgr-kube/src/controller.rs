//! Controller lifecycle
//!
//! Wires the executor, status store and watch stream together, runs the
//! dispatcher in the background and blocks until shutdown.

use std::sync::Arc;

use chartmgr_core::{ChartManager, ControllerConfig};
use futures::{Stream, StreamExt};
use kube::api::Api;
use kube::config::KubeConfigOptions;
use kube::runtime::{WatchStreamExt, watcher};
use tracing::{error, info, warn};

use crate::convergence::ConvergenceWaiter;
use crate::dispatcher::{Dispatcher, StopReason};
use crate::error::{ControllerError, Result};
use crate::event::{ChangeTracker, Event};
use crate::executor::{HelmExecutor, ReleaseExecutor};
use crate::handlers::Reconciler;
use crate::shutdown::ShutdownListener;
use crate::status::StatusWriter;
use crate::store::{KubeStatusStore, StatusStore};

/// The ChartManager controller
pub struct Controller<E, S> {
    reconciler: Arc<Reconciler<E, S>>,
    config: ControllerConfig,
    client: Option<kube::Client>,
}

impl Controller<HelmExecutor, KubeStatusStore> {
    /// Connect to the cluster and probe the helm binary
    pub async fn new(config: ControllerConfig) -> Result<Self> {
        let client = connect(config.helm.kube_context.as_deref()).await?;
        let executor = HelmExecutor::connect(&config.helm).await?;
        let store = KubeStatusStore::new(client.clone());
        Ok(Self::with_parts(executor, store, config).with_client(client))
    }
}

impl<E, S> Controller<E, S>
where
    E: ReleaseExecutor + 'static,
    S: StatusStore + 'static,
{
    /// Build a controller from an explicit executor and store
    pub fn with_parts(executor: E, store: S, config: ControllerConfig) -> Self {
        let writer = StatusWriter::new(store).with_conflict_retries(config.status_conflict_retries);
        let waiter = ConvergenceWaiter::from(config.convergence);
        Self {
            reconciler: Arc::new(Reconciler::new(executor, writer, waiter)),
            config,
            client: None,
        }
    }

    /// Use `client` for the watch connection
    pub fn with_client(mut self, client: kube::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<E, S>> {
        &self.reconciler
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Watch every ChartManager in the cluster until `shutdown` fires
    pub async fn run(self, shutdown: ShutdownListener) -> Result<()> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| ControllerError::Startup("no Kubernetes client configured".to_string()))?;
        self.run_with(watch_events(client), shutdown).await
    }

    /// Dispatch `events` until `shutdown` fires.
    ///
    /// Returns the shutdown cause as [`ControllerError::Cancelled`], or `Ok(())`
    /// if every [`Shutdown`](crate::Shutdown) handle was dropped without a cause.
    pub async fn run_with<St>(self, events: St, mut shutdown: ShutdownListener) -> Result<()>
    where
        St: Stream<Item = Event> + Send + 'static,
    {
        let mut dispatcher = if self.config.serialize_per_resource {
            Dispatcher::serialized(Arc::clone(&self.reconciler))
        } else {
            Dispatcher::new(Arc::clone(&self.reconciler))
        };

        let listener = shutdown.clone();
        let intake = tokio::spawn(async move {
            let stats = dispatcher.run(events, listener).await;
            if stats.reason == StopReason::StreamEnded {
                warn!(dispatched = stats.dispatched, "chartmanager event stream ended");
            }
            dispatcher
        });

        info!(
            serialize_per_resource = self.config.serialize_per_resource,
            "successfully started chartmanager controller"
        );

        let cause = shutdown.cancelled().await;

        match intake.await {
            Ok(mut dispatcher) => {
                let grace = self.config.shutdown_grace_period;
                if !grace.is_zero() {
                    dispatcher.drain(grace).await;
                }
            }
            Err(e) => error!(error = %e, "dispatcher task failed"),
        }

        match cause {
            Some(signal) => {
                info!(signal = %signal, "chartmanager controller stopped");
                Err(ControllerError::Cancelled(signal))
            }
            None => Ok(()),
        }
    }
}

/// Build a Kubernetes client, optionally for a specific kubeconfig context
pub async fn connect(context: Option<&str>) -> Result<kube::Client> {
    let client = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            let config = kube::Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ControllerError::Startup(format!("failed to load kubeconfig: {}", e)))?;
            kube::Client::try_from(config)?
        }
        None => kube::Client::try_default().await?,
    };
    Ok(client)
}

/// Change events for all ChartManagers, across namespaces, with no selectors
pub fn watch_events(client: kube::Client) -> impl Stream<Item = Event> + Send + 'static {
    let api: Api<ChartManager> = Api::all(client);
    let mut tracker = ChangeTracker::new();

    watcher(api, watcher::Config::default())
        .default_backoff()
        .filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "chartmanager watch failed, retrying");
                    None
                }
            }
        })
        .flat_map(move |event| futures::stream::iter(tracker.observe(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::shutdown::{Shutdown, ShutdownSignal};
    use crate::store::MockStatusStore;
    use chartmgr_core::{ChartManagerSpec, ChartRef, ReleaseState};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn resource(name: &str) -> ChartManager {
        let mut cm = ChartManager::new(
            name,
            ChartManagerSpec {
                chart: ChartRef {
                    name: "stable/nginx".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        cm.metadata.namespace = Some("default".to_string());
        cm
    }

    fn channel_stream(rx: mpsc::UnboundedReceiver<Event>) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) })
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_cancellation_cause() {
        let a = resource("a");
        let store = MockStatusStore::with_resources(vec![a.clone()]);
        let controller = Controller::with_parts(MockExecutor::new(), store.clone(), ControllerConfig::default());
        let shutdown = Shutdown::new();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Event::Added(Arc::new(a.clone()))).unwrap();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.trigger(ShutdownSignal::Sigterm);
        });

        let err = controller.run_with(channel_stream(rx), shutdown.listener()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Cancelled(ShutdownSignal::Sigterm)));

        let status = store.current(&a.id()).and_then(|c| c.status).unwrap();
        assert_eq!(status.state, ReleaseState::Deployed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_waits_for_in_flight_handlers() {
        let a = resource("a");
        let store = MockStatusStore::with_resources(vec![a.clone()]);
        let config = ControllerConfig {
            shutdown_grace_period: Duration::from_secs(300),
            ..Default::default()
        };
        let controller = Controller::with_parts(MockExecutor::ready_after(2), store.clone(), config);
        let shutdown = Shutdown::new();

        let events = futures::stream::iter(vec![Event::Added(Arc::new(a.clone()))]);
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger(ShutdownSignal::Sigint);
        });

        let err = controller.run_with(events, shutdown.listener()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Cancelled(ShutdownSignal::Sigint)));
        // The handler converged at 60s, well after the signal, before run returned
        assert!(store.current(&a.id()).and_then(|c| c.status).unwrap().is_deployed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unordered_fan_out_when_serialization_disabled() {
        let a = resource("a");
        let executor = MockExecutor::new();
        let config = ControllerConfig {
            serialize_per_resource: false,
            shutdown_grace_period: Duration::from_secs(10),
            ..Default::default()
        };
        let controller = Controller::with_parts(
            executor.clone(),
            MockStatusStore::with_resources(vec![a.clone()]),
            config,
        );
        let shutdown = Shutdown::new();

        let events = futures::stream::iter(vec![
            Event::Added(Arc::new(a.clone())),
            Event::Updated(Arc::new(a.clone()), Arc::new(a.clone())),
        ]);
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger(ShutdownSignal::Programmatic);
        });

        assert!(controller.run_with(events, shutdown.listener()).await.is_err());
        assert_eq!(executor.operation_counts().applies, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ok_when_shutdown_source_closes() {
        let controller = Controller::with_parts(
            MockExecutor::new(),
            MockStatusStore::new(),
            ControllerConfig::default(),
        );
        let shutdown = Shutdown::new();
        let listener = shutdown.listener();
        let (_tx, rx) = mpsc::unbounded_channel();

        let dropper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(shutdown);
        });

        assert!(controller.run_with(channel_stream(rx), listener).await.is_ok());
        dropper.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_without_client_fails_at_startup() {
        let controller = Controller::with_parts(
            MockExecutor::new(),
            MockStatusStore::new(),
            ControllerConfig::default(),
        );
        let err = controller.run(Shutdown::new().listener()).await.unwrap_err();
        assert!(matches!(err, ControllerError::Startup(_)));
    }
}
