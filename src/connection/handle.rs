// src/connection/handle.rs

//! Defines `ConnectionHandle`, the cloneable control surface of a running connection.

use super::status::ConnectionStatus;
use crate::core::LineWireError;
use std::net::SocketAddr;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

/// A reply waiting to be written by the connection's task.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) line: String,
    pub(crate) ack: Option<oneshot::Sender<Result<(), LineWireError>>>,
}

/// The connection-side ends of the channels behind a [`ConnectionHandle`].
#[derive(Debug)]
pub(crate) struct HandleReceivers {
    pub(crate) outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    pub(crate) kill_rx: broadcast::Receiver<()>,
    pub(crate) status_tx: watch::Sender<ConnectionStatus>,
}

/// A cheap, cloneable handle to a connection.
///
/// It can queue replies, stop the connection and observe its status from any
/// task, including from inside a command handler.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    peer: Option<SocketAddr>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    kill_tx: broadcast::Sender<()>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: u64, peer: Option<SocketAddr>) -> (Self, HandleReceivers) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Setup);
        let handle = Self {
            id,
            peer,
            outbound_tx,
            kill_tx,
            status_rx,
        };
        let receivers = HandleReceivers {
            outbound_rx,
            kill_rx,
            status_tx,
        };
        (handle, receivers)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queues `line` for sending and returns immediately.
    ///
    /// A CRLF terminator is appended on write. If the connection is already
    /// closed the line is dropped and the fact is only logged; write failures
    /// are reported as `SendFailed` events.
    pub fn send_string(&self, line: impl Into<String>) {
        let outbound = Outbound {
            line: line.into(),
            ack: None,
        };
        if self.outbound_tx.send(outbound).is_err() {
            debug!("Connection {}: dropping reply, connection is closed.", self.id);
        }
    }

    /// Queues `line` and waits until it has been written and flushed.
    ///
    /// Fails with `ConnectionClosed` if the connection goes away first, or with
    /// the underlying I/O error if the write fails. Command handlers run on the
    /// connection's own task and should use [`send_string`](Self::send_string).
    pub async fn send_string_confirmed(&self, line: impl Into<String>) -> Result<(), LineWireError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let outbound = Outbound {
            line: line.into(),
            ack: Some(ack_tx),
        };
        self.outbound_tx
            .send(outbound)
            .map_err(|_| LineWireError::ConnectionClosed)?;
        ack_rx.await.unwrap_or(Err(LineWireError::ConnectionClosed))
    }

    /// Stops the connection. Already queued replies are still written.
    pub fn cancel(&self) {
        // No receiver means the connection task has already finished.
        let _ = self.kill_tx.send(());
    }

    /// The connection's current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.status_rx.borrow().is_terminal()
    }

    /// A receiver that observes every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Resolves once the connection has been torn down.
    pub async fn closed(&self) {
        let mut rx = self.status_rx.clone();
        // An error means the connection was dropped without reaching teardown.
        let _ = rx.wait_for(ConnectionStatus::is_terminal).await;
    }
}
