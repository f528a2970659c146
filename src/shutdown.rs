use crate::components::ComponentManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
#[cfg(windows)]
use tokio::signal::windows::{ctrl_break, ctrl_c};

/// Wait for a termination signal, shut every component down, then cancel
/// `shutdown` so the HTTP server and background loops stop
pub async fn handle_signals(component_manager: Arc<ComponentManager>, shutdown: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {}
        _ = shutdown.cancelled() => return,
    }

    if let Err(e) = component_manager.shutdown_all().await {
        error!("Component shutdown failed: {}", e);
    }

    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
        }
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down");
        }
    }
}

#[cfg(windows)]
async fn wait_for_signal() {
    let (mut ctrlc, mut ctrlbreak) = match (ctrl_c(), ctrl_break()) {
        (Ok(c), Ok(b)) => (c, b),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = ctrlc.recv() => {
            info!("Ctrl+C received, shutting down");
        }
        _ = ctrlbreak.recv() => {
            info!("Ctrl+Break received, shutting down");
        }
    }
}
