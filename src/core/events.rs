// src/core/events.rs

//! Structured observability events and the sinks that receive them.
//!
//! The listener and every connection report status transitions and dispatch
//! outcomes as [`ServerEvent`]s to an injected [`EventSink`]. The default sink
//! logs them through `tracing`; tests use a [`ChannelSink`] to assert on them.

use crate::connection::{ConnectionStatus, ListenerStatus};
use crate::server::RejectReason;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Why a connection's receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the stream without an error.
    EndOfStream,
    /// The transport failed, timed out, or delivered undecodable data.
    Failed(String),
    /// The connection was stopped explicitly, by a handler or on shutdown.
    Stopped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => write!(f, "closed by peer"),
            CloseReason::Failed(reason) => write!(f, "failed: {reason}"),
            CloseReason::Stopped => write!(f, "stopped"),
        }
    }
}

/// Every observable occurrence in the server's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ListenerStatusChanged(ListenerStatus),
    ConnectionAccepted {
        id: u64,
        peer: SocketAddr,
    },
    ConnectionRejected {
        peer: SocketAddr,
        reason: RejectReason,
    },
    ConnectionStatusChanged {
        id: u64,
        status: ConnectionStatus,
    },
    CommandDispatched {
        id: u64,
        command: String,
        arity: usize,
    },
    /// No registration matched; `known_name` is true when only the arity was wrong.
    UnknownCommand {
        id: u64,
        command: String,
        arity: usize,
        known_name: bool,
    },
    InvalidArguments {
        id: u64,
        command: String,
        reason: String,
    },
    HandlerFailed {
        id: u64,
        command: String,
        error: String,
    },
    SendFailed {
        id: u64,
        error: String,
    },
    ConnectionClosed {
        id: u64,
        reason: CloseReason,
    },
}

/// A destination for [`ServerEvent`]s. Implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: ServerEvent);
}

/// Logs every event through `tracing` at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServerEvent) {
        match event {
            ServerEvent::ListenerStatusChanged(status) => match status {
                ListenerStatus::Failed(_) => error!("Listener status: {}", status),
                ListenerStatus::Waiting(_) => warn!("Listener status: {}", status),
                _ => info!("Listener status: {}", status),
            },
            ServerEvent::ConnectionAccepted { id, peer } => {
                info!("Accepted connection {} from {}", id, peer);
            }
            ServerEvent::ConnectionRejected { peer, reason } => {
                warn!("Rejected connection from {}: {}", peer, reason);
            }
            ServerEvent::ConnectionStatusChanged { id, status } => match status {
                ConnectionStatus::Failed(_) | ConnectionStatus::Waiting(_) => {
                    warn!("Connection {} status: {}", id, status)
                }
                _ => debug!("Connection {} status: {}", id, status),
            },
            ServerEvent::CommandDispatched { id, command, arity } => {
                debug!("Connection {}: dispatched '{}' ({} args)", id, command, arity);
            }
            ServerEvent::UnknownCommand {
                id,
                command,
                arity,
                known_name,
            } => {
                if known_name {
                    warn!(
                        "Connection {}: wrong number of arguments ({}) for '{}'",
                        id, arity, command
                    );
                } else {
                    warn!("Connection {}: unknown command '{}'", id, command);
                }
            }
            ServerEvent::InvalidArguments {
                id,
                command,
                reason,
            } => {
                warn!(
                    "Connection {}: invalid arguments for '{}': {}",
                    id, command, reason
                );
            }
            ServerEvent::HandlerFailed { id, command, error } => {
                error!(
                    "Connection {}: unknown error while handling '{}': {}",
                    id, command, error
                );
            }
            ServerEvent::SendFailed { id, error } => {
                warn!("Connection {}: failed to send reply: {}", id, error);
            }
            ServerEvent::ConnectionClosed { id, reason } => match reason {
                CloseReason::Failed(_) => warn!("Connection {} {}", id, reason),
                _ => info!("Connection {} {}", id, reason),
            },
        }
    }
}

/// Forwards every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ServerEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ServerEvent) {
        // A closed receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Fans every event out to several sinks, in order.
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: ServerEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
