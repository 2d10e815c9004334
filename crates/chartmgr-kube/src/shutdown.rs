//! Cancellation signal shared by the controller and its dispatcher
//!
//! A [`Shutdown`] is triggered once with a cause; every [`ShutdownListener`]
//! observes that cause. Later triggers are ignored.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Why the controller was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM signal received
    Sigterm,
    /// SIGINT signal received (Ctrl+C)
    Sigint,
    /// Programmatic shutdown requested
    Programmatic,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sigterm => write!(f, "SIGTERM"),
            Self::Sigint => write!(f, "SIGINT"),
            Self::Programmatic => write!(f, "PROGRAMMATIC"),
        }
    }
}

/// Trigger side of the cancellation signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownSignal>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Returns `false` if a cause was already recorded.
    pub fn trigger(&self, signal: ShutdownSignal) -> bool {
        let first = self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(signal);
                true
            } else {
                false
            }
        });
        if first {
            info!(signal = %signal, "shutdown requested");
        } else {
            debug!(signal = %signal, "shutdown already in progress, ignoring duplicate signal");
        }
        first
    }

    /// Recorded cause, if shutdown was triggered
    pub fn cause(&self) -> Option<ShutdownSignal> {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side of the cancellation signal
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownListener {
    /// Resolve once shutdown is triggered, yielding its cause.
    ///
    /// Yields `None` if every [`Shutdown`] handle was dropped without a trigger.
    pub async fn cancelled(&mut self) -> Option<ShutdownSignal> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(cause) => *cause,
            Err(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_sees_cause() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert!(!listener.is_cancelled());

        assert!(shutdown.trigger(ShutdownSignal::Sigterm));
        assert_eq!(listener.cancelled().await, Some(ShutdownSignal::Sigterm));
        assert!(listener.is_cancelled());
    }

    #[tokio::test]
    async fn test_first_cause_wins() {
        let shutdown = Shutdown::new();
        assert!(shutdown.trigger(ShutdownSignal::Sigint));
        assert!(!shutdown.trigger(ShutdownSignal::Programmatic));
        assert_eq!(shutdown.cause(), Some(ShutdownSignal::Sigint));

        // Listeners created after the trigger still observe it
        let mut late = shutdown.listener();
        assert_eq!(late.cancelled().await, Some(ShutdownSignal::Sigint));
    }

    #[tokio::test]
    async fn test_dropped_without_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        drop(shutdown);
        assert_eq!(listener.cancelled().await, None);
    }

    #[tokio::test]
    async fn test_trigger_from_another_task() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            trigger.trigger(ShutdownSignal::Programmatic);
        });
        assert_eq!(listener.cancelled().await, Some(ShutdownSignal::Programmatic));
    }
}
