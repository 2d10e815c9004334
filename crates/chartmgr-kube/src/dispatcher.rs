//! Event fan-out
//!
//! The dispatcher hands every event to the [`Reconciler`] on its own task and
//! immediately goes back to reading the stream. It does no business logic and
//! never retries: a failed handler is final for that event. Handler tasks are
//! not cancelled on shutdown; [`Dispatcher::drain`] waits for them on a
//! best-effort basis.

use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, Stream, StreamExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::event::Event;
use crate::executor::ReleaseExecutor;
use crate::handlers::Reconciler;
use crate::queue::IdentityQueue;
use crate::shutdown::ShutdownListener;
use crate::store::StatusStore;

/// Why [`Dispatcher::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown signal fired
    Cancelled,
    /// The event stream ended
    StreamEnded,
}

/// Summary of a dispatcher run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatched: usize,
    pub reason: StopReason,
}

/// Fans events out to handler tasks
pub struct Dispatcher<E, S> {
    reconciler: Arc<Reconciler<E, S>>,
    queue: Option<IdentityQueue>,
    tasks: JoinSet<()>,
}

impl<E, S> Dispatcher<E, S>
where
    E: ReleaseExecutor + 'static,
    S: StatusStore + 'static,
{
    /// Unordered fan-out: one task per event, no ordering between events
    pub fn new(reconciler: Arc<Reconciler<E, S>>) -> Self {
        Self {
            reconciler,
            queue: None,
            tasks: JoinSet::new(),
        }
    }

    /// Events for the same resource run one after another, in delivery order
    pub fn serialized(reconciler: Arc<Reconciler<E, S>>) -> Self {
        Self {
            reconciler,
            queue: Some(IdentityQueue::new()),
            tasks: JoinSet::new(),
        }
    }

    /// Handler tasks (or per-resource workers) still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Dispatch events until the stream ends or shutdown fires
    pub async fn run<St>(&mut self, events: St, mut shutdown: ShutdownListener) -> DispatchStats
    where
        St: Stream<Item = Event>,
    {
        let mut events = std::pin::pin!(events);
        let mut dispatched = 0;

        let reason = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break StopReason::Cancelled,
                next = events.next() => match next {
                    Some(event) => {
                        self.dispatch(event);
                        dispatched += 1;
                    }
                    None => break StopReason::StreamEnded,
                },
            }
            self.reap();
        };

        info!(dispatched, in_flight = self.in_flight(), reason = ?reason, "stopped accepting events");
        DispatchStats { dispatched, reason }
    }

    /// Hand one event to a handler task without waiting for it
    pub fn dispatch(&mut self, event: Event) {
        let id = event.id();
        debug!(resource = %id, event = event.kind(), "dispatching event");

        let reconciler = Arc::clone(&self.reconciler);
        let job = async move { reconciler.handle(event).await }.boxed();

        match &self.queue {
            Some(queue) => {
                if let Some(worker) = queue.submit(id, job) {
                    self.tasks.spawn(worker);
                }
            }
            None => {
                self.tasks.spawn(job);
            }
        }
    }

    /// Wait up to `grace` for in-flight handlers; returns how many are still running
    pub async fn drain(&mut self, grace: Duration) -> usize {
        if self.tasks.is_empty() {
            return 0;
        }
        info!(in_flight = self.in_flight(), grace = ?grace, "waiting for in-flight handlers");
        let joined = tokio::time::timeout(grace, async {
            while let Some(result) = self.tasks.join_next().await {
                log_join_error(result);
            }
        })
        .await;
        if joined.is_err() {
            warn!(remaining = self.in_flight(), "handlers still running after grace period");
        }
        self.in_flight()
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_error(result);
        }
    }
}

impl<E, S> Drop for Dispatcher<E, S> {
    // Handlers are never aborted; whatever is still running is left to finish
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "handler task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::ConvergenceWaiter;
    use crate::executor::MockExecutor;
    use crate::shutdown::{Shutdown, ShutdownSignal};
    use crate::status::StatusWriter;
    use crate::store::MockStatusStore;
    use chartmgr_core::{ChartManager, ChartManagerSpec, ChartRef, ReleaseState};
    use tokio::time::Instant;

    fn resource(name: &str, version: &str) -> ChartManager {
        let mut cm = ChartManager::new(
            name,
            ChartManagerSpec {
                chart: ChartRef {
                    name: "stable/nginx".to_string(),
                    version: Some(version.to_string()),
                    repository: None,
                },
                ..Default::default()
            },
        );
        cm.metadata.namespace = Some("default".to_string());
        cm
    }

    fn reconciler(
        executor: MockExecutor,
        resources: Vec<ChartManager>,
    ) -> Arc<Reconciler<MockExecutor, MockStatusStore>> {
        Arc::new(Reconciler::new(
            executor,
            StatusWriter::new(MockStatusStore::with_resources(resources)),
            ConvergenceWaiter::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_resources_converge_concurrently() {
        let a = resource("a", "1.0.0");
        let b = resource("b", "1.0.0");
        let r = reconciler(MockExecutor::ready_after(2), vec![a.clone(), b.clone()]);
        let mut dispatcher = Dispatcher::serialized(Arc::clone(&r));
        let shutdown = Shutdown::new();

        let start = Instant::now();
        let events = futures::stream::iter(vec![
            Event::Added(Arc::new(a.clone())),
            Event::Added(Arc::new(b.clone())),
        ]);
        let stats = dispatcher.run(events, shutdown.listener()).await;
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.reason, StopReason::StreamEnded);

        assert_eq!(dispatcher.drain(Duration::from_secs(600)).await, 0);

        // Each release needs 60s to converge; together they still take 60s
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        let store = r.writer().store();
        for cm in [&a, &b] {
            let status = store.current(&cm.id()).and_then(|c| c.status).unwrap();
            assert_eq!(status.state, ReleaseState::Deployed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_resource_events_apply_in_order() {
        let v1 = resource("a", "1.0.0");
        let v2 = resource("a", "2.0.0");
        let r = reconciler(MockExecutor::ready_after(2), vec![v1.clone()]);
        let mut dispatcher = Dispatcher::serialized(Arc::clone(&r));

        let events = futures::stream::iter(vec![
            Event::Added(Arc::new(v1.clone())),
            Event::Updated(Arc::new(v1.clone()), Arc::new(v2.clone())),
        ]);
        let shutdown = Shutdown::new();
        dispatcher.run(events, shutdown.listener()).await;
        dispatcher.drain(Duration::from_secs(600)).await;

        let writes = r.writer().store().writes();
        let versions: Vec<_> = writes
            .iter()
            .map(|w| w.spec.chart.version.clone().unwrap_or_default())
            .collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
        let last = r.writer().store().current(&v2.id()).unwrap();
        assert_eq!(last.spec.chart.version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unordered_mode_spawns_per_event() {
        let a = resource("a", "1.0.0");
        let r = reconciler(MockExecutor::ready_after(2), vec![a.clone()]);
        let mut dispatcher = Dispatcher::new(Arc::clone(&r));

        dispatcher.dispatch(Event::Added(Arc::new(a.clone())));
        dispatcher.dispatch(Event::Updated(Arc::new(a.clone()), Arc::new(a.clone())));
        assert_eq!(dispatcher.in_flight(), 2);

        let start = Instant::now();
        dispatcher.drain(Duration::from_secs(600)).await;
        // Both handlers wait side by side
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(r.executor().operation_counts().applies, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_intake_without_cancelling_handlers() {
        let a = resource("a", "1.0.0");
        let r = reconciler(MockExecutor::ready_after(2), vec![a.clone()]);
        let mut dispatcher = Dispatcher::serialized(Arc::clone(&r));
        let shutdown = Shutdown::new();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let events = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        tx.send(Event::Added(Arc::new(a.clone()))).unwrap();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger(ShutdownSignal::Programmatic);
        });

        let stats = dispatcher.run(events, shutdown.listener()).await;
        assert_eq!(stats.reason, StopReason::Cancelled);
        assert_eq!(stats.dispatched, 1);

        // The stream was dropped with the loop; later events go nowhere
        assert!(tx.send(Event::Deleted(Arc::new(a.clone()))).is_err());

        // The in-flight handler is still converging and finishes on its own
        assert_eq!(dispatcher.in_flight(), 1);
        assert_eq!(dispatcher.drain(Duration::from_secs(600)).await, 0);
        assert_eq!(r.executor().operation_counts().deletes, 0);
        assert!(
            r.writer()
                .store()
                .current(&a.id())
                .and_then(|c| c.status)
                .unwrap()
                .is_deployed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_grace() {
        let a = resource("a", "1.0.0");
        let r = reconciler(MockExecutor::never_ready(), vec![a.clone()]);
        let mut dispatcher = Dispatcher::serialized(Arc::clone(&r));

        dispatcher.dispatch(Event::Added(Arc::new(a)));
        assert_eq!(dispatcher.drain(Duration::from_secs(10)).await, 1);
    }
}
