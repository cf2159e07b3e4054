//! quiet-mode-daemon: mutes notifications while the device lies face-down
//!
//! This daemon provides:
//! - Accelerometer and proximity sampling via Linux IIO
//! - A mute state machine driving the host interruption filter
//! - A scanning service with a persisted running flag
//! - IPC server for control surfaces (start/stop, status, notifications)
//!
//! Usage: `quiet-mode-daemon [start-scanning|stop-scanning]`

mod config;
mod events;
mod host;
mod ipc;
mod lifecycle;
mod sensors;
mod service;
mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::ServiceEvent;
use crate::host::{FileNotificationPolicy, FileRunningFlag, LogForeground, RunningFlagStore};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::sensors::{IioSensorSource, IioSettings};
use crate::service::{ControlCommand, ScanningService, ServiceHandles};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "quiet-mode-daemon starting"
    );

    let initial_command = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<ControlCommand>())
        .transpose()?;

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.iio_root, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Service -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<ServiceEvent>(64);

    let running_flag = Arc::new(FileRunningFlag::new(config.running_flag_path.clone()));
    let handles = ServiceHandles {
        sensors: Arc::new(IioSensorSource::discover(
            &config.iio_root,
            IioSettings {
                poll_interval: config.poll_interval,
                proximity_near_threshold: config.proximity_near_threshold,
            },
        )),
        policy: Arc::new(FileNotificationPolicy::new(config.filter_path.clone())),
        running_flag: running_flag.clone(),
        foreground: Arc::new(LogForeground),
    };

    let service = Arc::new(Mutex::new(ScanningService::new(handles, event_tx.clone())));

    // A flag still set means the previous process died without cleaning up
    let was_running = running_flag.get().unwrap_or_else(|e| {
        warn!(?e, "failed to read running flag");
        false
    });

    let command = match (initial_command, was_running) {
        (Some(command), _) => Some(command),
        (None, true) => {
            info!("running flag still set, resuming scanning");
            Some(ControlCommand::Start)
        }
        (None, false) => None,
    };

    if let Some(command) = command {
        let mut service = service.lock().await;
        if let Err(e) = service.handle_command(command) {
            error!(%command, code = e.code(), "initial command failed: {e}");
            if was_running {
                // Keep a failed resume from retrying on every launch
                if let Err(e) = running_flag.set(false) {
                    warn!(?e, "failed to clear running flag");
                }
            }
        }
    }

    let server = Server::new(&config.socket_path, Arc::clone(&service), event_tx.clone())
        .context("failed to start IPC server")?;

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log service events
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "service event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "service event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("service event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    service.lock().await.destroy();
    server.shutdown().await;

    info!("quiet-mode-daemon stopped");

    Ok(())
}
