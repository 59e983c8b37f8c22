use std::sync::Arc;

use actix_web::dev::ServerHandle;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::registry::JobRegistry;

/// Handles graceful shutdown of the application
///
/// This module orchestrates graceful shutdown by:
/// 1. Listening for shutdown signals (SIGTERM, SIGINT/CTRL+C)
/// 2. Stopping the HTTP server (stops accepting new requests)
/// 3. Raising the stop flag on every registered job
/// 4. Waiting for running engine tasks to finish their current item
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    registry: Arc<JobRegistry>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            registry,
        }
    }

    /// Wait for shutdown signal and perform graceful shutdown
    ///
    /// Blocks until CTRL+C or (on Unix) SIGTERM is received, then drains
    /// the server and the job engines.
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<(), std::io::Error> {
        // 1. Stop HTTP server (stop accepting new requests)
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        // 2. Signal every job to stop; engines observe the flag at their
        // next iteration boundary, so the in-flight company completes.
        let handles = self.registry.handles();
        info!("Signaling {} registered jobs to stop...", handles.len());
        for handle in &handles {
            handle.request_stop();
        }

        // 3. Wait for running engine tasks to drain
        let mut drained = 0;
        for handle in handles {
            if let Some(task) = handle.take_task() {
                match task.await {
                    Ok(()) => {
                        drained += 1;
                        info!("Job {} engine stopped", handle.id);
                    }
                    Err(err) => error!("Job {} engine task failed to join: {:?}", handle.id, err),
                }
            }
        }
        info!("All engine tasks drained ({} were running)", drained);

        // 4. Wait for HTTP server task to complete
        info!("Waiting for HTTP server to fully shut down...");
        match self.server_task.await {
            Ok(Ok(())) => info!("HTTP server shut down successfully"),
            Ok(Err(err)) => error!("HTTP server encountered error during shutdown: {:?}", err),
            Err(err) => error!("HTTP server task panicked: {:?}", err),
        }

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
