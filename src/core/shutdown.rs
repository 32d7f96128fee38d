//! Shutdown coordination for the worker pool and the reconciliation loop
//!
//! A broadcast channel fans the shutdown notice out to every worker; the
//! atomic flag lets loops poll between jobs without awaiting the channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across long-running tasks
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Wait until shutdown is requested
    ///
    /// Returns immediately when shutdown was already triggered before the call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown_requested() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Install SIGINT/SIGTERM/SIGHUP/SIGQUIT handlers that trigger this coordinator
    ///
    /// A second signal forces an immediate exit with status 130.
    pub fn install_signal_handlers(&self) {
        let signal_count = Arc::new(AtomicUsize::new(0));

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            for kind in [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
                SignalKind::quit(),
            ] {
                let coordinator = self.clone();
                let counter = signal_count.clone();
                tokio::spawn(async move {
                    if let Ok(mut sig) = signal(kind) {
                        while sig.recv().await.is_some() {
                            coordinator.on_signal(&counter);
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal(&signal_count);
                }
            });
        }
    }

    fn on_signal(&self, counter: &AtomicUsize) {
        let previous = counter.fetch_add(1, Ordering::AcqRel);
        if previous >= 1 {
            log::warn!("Second shutdown signal received; exiting");
            std::process::exit(130);
        }
        log::info!("Shutdown requested; finishing in-flight jobs");
        self.trigger_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
