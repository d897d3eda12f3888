//! Shutdown coordination for background tasks.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A spawned task paired with its own shutdown signal.
///
/// `stop` signals and joins. Dropping without `stop` still signals, so the
/// task winds down on its own at its next cancellation point.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawn `task`, handing it the receiver it must watch for shutdown.
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let handle = tokio::spawn(task(rx));
        tracing::debug!(task = name, "Background task started");
        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => tracing::debug!(task = self.name, "Background task stopped"),
                Err(e) if e.is_panic() => {
                    tracing::error!(task = self.name, "Background task panicked")
                }
                Err(_) => tracing::debug!(task = self.name, "Background task cancelled"),
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown.trigger();
        }
    }
}
