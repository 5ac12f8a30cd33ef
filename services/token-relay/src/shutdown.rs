//! Graceful shutdown.
//!
//! On Ctrl-C or SIGTERM the server stops accepting connections and gets a
//! bounded window to drain in-flight exchanges.

use std::future::IntoFuture;
use std::io;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    /// Gets a shutdown receiver
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Signals every subscriber.
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns true once [`Self::trigger`] has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for shutdown signal. Also returns if the coordinator is dropped.
    pub async fn recv(mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }

    /// Checks if shutdown has been signaled (non-blocking)
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Runs `server` until it stops or an OS signal arrives. On a signal the
/// coordinator is triggered and the server gets `drain_timeout` to finish.
///
/// # Errors
///
/// Returns the server's own I/O error.
pub async fn run_with_graceful_shutdown<F>(
    server: F,
    coordinator: ShutdownCoordinator,
    drain_timeout: Duration,
) -> io::Result<()>
where
    F: IntoFuture<Output = io::Result<()>>,
{
    let server = server.into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            match &result {
                Ok(()) => info!("Server stopped normally"),
                Err(e) => error!(error = %e, "Server error"),
            }
            return result;
        }
        () = wait_for_os_signal() => {
            info!("Shutdown signal received");
        }
    }

    coordinator.trigger();

    if let Ok(result) = tokio::time::timeout(drain_timeout, server).await {
        info!("Shutdown complete");
        result
    } else {
        warn!(timeout = ?drain_timeout, "Shutdown timeout reached, dropping remaining connections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_reaches_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.subscribe();
        assert!(!signal.is_shutdown());

        let waiter = tokio::spawn(signal.clone().recv());
        coordinator.trigger();
        waiter.await.unwrap();

        assert!(signal.is_shutdown());
        assert!(coordinator.is_triggered());
    }

    #[tokio::test]
    async fn test_server_exit_is_returned() {
        let coordinator = ShutdownCoordinator::new();
        let result = run_with_graceful_shutdown(
            async { Err::<(), _>(io::Error::other("bind failed")) },
            coordinator,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_err());
    }
}
