// src/server/mod.rs

//! The TCP listener: binding, admission, the accept loop and shutdown.

use crate::config::Config;
use crate::connection::{ConnectionHandle, ListenerStatus};
use crate::core::commands::CommandTable;
use crate::core::events::{EventSink, TracingSink};
use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

mod admission;
mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use admission::{AdmissionController, RejectReason, ServerMode, SlotLease};
pub use connection_loop::shutdown_signal;

/// A bound listener, ready to accept connections.
pub struct Server {
    ctx: context::ServerContext,
    local_addr: SocketAddr,
}

impl Server {
    /// Validates `config`, binds the listener and reports `Ready`.
    pub async fn bind(
        config: Config,
        table: CommandTable,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let ctx = initialization::setup(config, table, events).await?;
        let local_addr = ctx.listener.local_addr()?;
        Ok(Self { ctx, local_addr })
    }

    /// The address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mode(&self) -> ServerMode {
        self.ctx.admission.mode()
    }

    /// A receiver that observes every listener status change.
    pub fn status(&self) -> watch::Receiver<ListenerStatus> {
        self.ctx.status_tx.subscribe()
    }

    /// A handle to the admission state, usable after the server has been moved
    /// into its task.
    pub fn admission(&self) -> AdmissionController {
        self.ctx.admission.clone()
    }

    /// The registry of live connections.
    pub fn clients(&self) -> Arc<DashMap<u64, ConnectionHandle>> {
        self.ctx.clients.clone()
    }

    /// Runs the accept loop until `shutdown` resolves, then stops every
    /// connection and moves the listener to `Cancelled`.
    ///
    /// Fails if a background task, such as the metrics server, failed and
    /// brought the listener down with it.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        spawner::spawn_all(&mut self.ctx);
        connection_loop::run(self.ctx, shutdown).await
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }
}

/// Binds a server for `config`, logs its events through `tracing` and runs it
/// until the process is signalled.
pub async fn run(config: Config, table: CommandTable) -> Result<()> {
    Server::bind(config, table, Arc::new(TracingSink))
        .await?
        .run()
        .await
}
