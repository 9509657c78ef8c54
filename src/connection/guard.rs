// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use super::handle::ConnectionHandle;
use crate::core::metrics;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// An RAII guard that keeps a connection in the listener's client registry for
/// exactly as long as its task is alive.
pub struct ConnectionGuard {
    /// The listener's registry of live connections.
    pub(crate) clients: Arc<DashMap<u64, ConnectionHandle>>,
    /// The connection identifier.
    pub(crate) id: u64,
    /// The network address of the client.
    pub(crate) addr: SocketAddr,
}

impl ConnectionGuard {
    /// Registers `handle` and returns the guard that will unregister it.
    pub(crate) fn new(
        clients: Arc<DashMap<u64, ConnectionHandle>>,
        handle: ConnectionHandle,
        addr: SocketAddr,
    ) -> Self {
        let id = handle.id();
        clients.insert(id, handle);
        metrics::CONNECTED_CLIENTS.inc();
        Self { clients, id, addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!(
            "ConnectionGuard dropping, cleaning up resources for connection {}",
            self.addr
        );
        if self.clients.remove(&self.id).is_none() {
            debug!("Client {} was not in the registry upon cleanup.", self.addr);
        }
    }
}
