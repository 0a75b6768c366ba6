//! Handles for periodic background work
//!
//! A `BackgroundTask` owns a spawned loop plus the channel used to ask it to
//! stop. The loop only checks for shutdown between runs of its job, so a run
//! in progress always completes (and commits) before the task exits.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiving side of a stop request, passed to every loop
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested (or the handle was dropped)
    pub async fn requested(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `delay` unless a stop arrives first. Returns false on stop.
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.requested() => false,
        }
    }
}

/// A named, stoppable background loop
pub struct BackgroundTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Spawn `body` with a fresh shutdown signal
    pub fn start<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(Shutdown) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(body(Shutdown { rx: stop_rx }));
        info!(task = name, "Background task started");

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Ask the loop to exit after its current run
    pub fn stop(&self) {
        debug!(task = self.name, "Stop requested");
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the loop to finish
    pub async fn join(self) {
        match self.handle.await {
            Ok(()) => info!(task = self.name, "Background task stopped"),
            Err(e) => warn!(task = self.name, error = %e, "Background task ended abnormally"),
        }
    }

    /// Stop and wait
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
