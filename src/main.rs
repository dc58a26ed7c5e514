//! deskmate: background daemon for a voice and text desktop assistant
//!
//! The daemon provides:
//! - A fixed menu of actions (Wikipedia, YouTube, Google, news, files, exit)
//! - Speech or text command capture, switchable at any time
//! - Spoken and popup feedback for every result
//! - IPC server for front-end communication
//!
//! Front-ends draw the menu from `get_menu`, forward button presses as
//! `trigger` requests and render popups from pushed events.

mod actions;
mod collab;
mod config;
mod dispatch;
mod events;
mod feedback;
mod ipc;
mod lifecycle;
mod state;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::collab::Services;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::events::AssistantEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "deskmate starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, language = %config.wiki.language, "configuration loaded");

    if !config.allow_power_control {
        debug!("power control disabled");
    }

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Dispatcher and mode state -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<AssistantEvent>(64);

    let services = Services::from_config(&config);
    let dispatcher = Dispatcher::new(services, &config, event_tx.clone());

    let server = Server::new(
        &config.socket_path,
        dispatcher,
        event_tx.clone(),
        shutdown.clone(),
        &config.wiki.language,
    )?;

    // Subscribe to assistant events for logging
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

        // Trace every assistant event
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "assistant event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event logger exited");
        }

        // Wait for a signal or the Exit action
        _ = shutdown.wait() => {
            if shutdown.is_triggered() {
                info!("exit action received");
            } else {
                info!("shutdown signal received");
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("deskmate stopped");

    Ok(())
}
