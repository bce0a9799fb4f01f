//! Signal handling for graceful shutdown, config reload, and the bounded
//! process lifetime.

use crate::config::ConfigLoader;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Creates a future that completes when the process should stop.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). If `restart_after` is set, the
/// future also completes once that interval elapses — worker processes are
/// expected to be recycled periodically by a supervisor, which is safe
/// because no hook row is ever left both locked and unprocessed past its
/// lease.
pub async fn shutdown_signal(restart_after: Option<Duration>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    let restart_deadline = async {
        match restart_after {
            Some(interval) => tokio::time::sleep(interval).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = restart_deadline => {
            tracing::info!("Restart interval elapsed, recycling worker process");
        }
    }
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Returns a Notify used to stop the task during shutdown.
pub fn spawn_config_reload_handler(
    state: AppState,
    config_loader: Arc<ConfigLoader>,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            *state.config.server.write().await = loaded_config.server;
                            *state.config.admin.write().await = loaded_config.admin;
                            *state.config.provider.write().await = loaded_config.provider;
                            *state.config.delivery.write().await = loaded_config.delivery;
                            *state.config.worker.write().await = loaded_config.worker;

                            tracing::info!("Configuration reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
