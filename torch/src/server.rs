//! Server lifecycle management
//!
//! Starts the retry worker, the workload watcher and the HTTP server, then
//! waits for a shutdown signal and stops them together.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use torch_cluster::{ChangeWatcher, PeerCoordinator, RetryWorker};
use torch_core::Config;

pub struct TorchServer {
    config: Config,
    coordinator: Arc<PeerCoordinator>,
    worker: RetryWorker,
    watcher: Option<ChangeWatcher>,
}

impl TorchServer {
    pub const fn new(
        config: Config,
        coordinator: Arc<PeerCoordinator>,
        worker: RetryWorker,
        watcher: Option<ChangeWatcher>,
    ) -> Self {
        Self {
            config,
            coordinator,
            worker,
            watcher,
        }
    }

    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();

        let worker_handle = self.worker.start(cancel.child_token());

        // The first watch must come up; later drops reconnect on their own
        let watcher_handle = match self.watcher {
            Some(watcher) => Some(
                watcher
                    .start(cancel.child_token())
                    .await
                    .context("failed to start workload watcher")?,
            ),
            None => {
                warn!("Workload watcher disabled, new DA nodes are only resolved on request");
                None
            }
        };

        // Publish identities for every configured node without delaying startup
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let outcome = coordinator.register_all().await;
            info!(
                resolved = outcome.identities.len(),
                unresolved = outcome.unresolved.len(),
                pushed = outcome.pushed,
                "Initial registration finished"
            );
        });

        let http_addr = self.config.http_address();
        let listener = tokio::net::TcpListener::bind(&http_addr)
            .await
            .with_context(|| format!("failed to bind HTTP address {http_addr}"))?;
        info!("HTTP server listening on {}", http_addr);

        let router = torch_api::create_router(self.coordinator);
        let graceful = cancel.clone().cancelled_owned();
        let mut http_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }
            info!("HTTP server shut down gracefully");
        });

        let http_stopped = tokio::select! {
            _ = &mut http_handle => {
                error!("HTTP server stopped unexpectedly");
                true
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
                false
            }
        };

        cancel.cancel();
        if !http_stopped {
            let _ = http_handle.await;
        }
        let _ = worker_handle.await;
        if let Some(handle) = watcher_handle {
            let _ = handle.await;
        }

        info!("Torch stopped");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
