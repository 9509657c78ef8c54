// src/server/context.rs

use super::admission::AdmissionController;
use crate::config::Config;
use crate::connection::{ConnectionHandle, ConnectionSettings, ListenerStatus};
use crate::core::commands::CommandTable;
use crate::core::events::{EventSink, ServerEvent};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub config: Config,
    pub listener: TcpListener,
    pub table: Arc<CommandTable>,
    pub events: Arc<dyn EventSink>,
    pub admission: AdmissionController,
    /// Live connections by id, maintained by `ConnectionGuard`.
    pub clients: Arc<DashMap<u64, ConnectionHandle>>,
    pub settings: ConnectionSettings,
    pub status_tx: watch::Sender<ListenerStatus>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}

impl ServerContext {
    /// Publishes a listener status change to watchers and the event sink.
    pub fn set_status(&self, status: ListenerStatus) {
        self.status_tx.send_replace(status.clone());
        self.events.emit(ServerEvent::ListenerStatusChanged(status));
    }
}
