// src/server/initialization.rs

//! Handles server initialization: configuration checks and binding the listener.

use super::admission::{AdmissionController, ServerMode};
use super::context::ServerContext;
use crate::config::Config;
use crate::connection::ListenerStatus;
use crate::core::commands::CommandTable;
use crate::core::events::{EventSink, ServerEvent};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Validates the configuration and binds the listening socket.
///
/// The listener moves from `Setup` to `Ready` on success and to `Failed` if
/// the address cannot be bound.
pub async fn setup(
    config: Config,
    table: CommandTable,
    events: Arc<dyn EventSink>,
) -> Result<ServerContext> {
    config.validate()?;
    events.emit(ServerEvent::ListenerStatusChanged(ListenerStatus::Setup));
    log_startup_info(&config, &table);

    let listener = match TcpListener::bind((config.host.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            events.emit(ServerEvent::ListenerStatusChanged(ListenerStatus::Failed(
                e.to_string(),
            )));
            return Err(e).with_context(|| {
                format!("Failed to bind listener on {}:{}", config.host, config.port)
            });
        }
    };
    let local_addr = listener.local_addr()?;
    info!(
        "LineWire server listening on {} ({} mode, {} framing)",
        local_addr,
        config.mode,
        config.framing()
    );

    let (status_tx, _) = watch::channel(ListenerStatus::Setup);
    let (shutdown_tx, _) = broadcast::channel(1);

    let ctx = ServerContext {
        admission: AdmissionController::new(config.mode, config.max_clients),
        settings: config.connection_settings(),
        config,
        listener,
        table: Arc::new(table),
        events,
        clients: Arc::new(DashMap::new()),
        status_tx,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    };
    ctx.set_status(ListenerStatus::Ready);
    Ok(ctx)
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config, table: &CommandTable) {
    if table.is_empty() {
        warn!("WARNING: No commands are registered. Every message will be reported as unknown.");
    } else {
        info!("Serving {} registered command(s).", table.len());
    }
    match config.mode {
        ServerMode::Multi => info!("Accepting up to {} concurrent clients.", config.max_clients),
        ServerMode::Single => info!("Accepting one client at a time."),
    }
    if let Some(timeout) = config.idle_timeout() {
        info!("Idle connections are closed after {:?}.", timeout);
    }
}
