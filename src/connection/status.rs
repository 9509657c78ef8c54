// src/connection/status.rs

//! Lifecycle states for connections and the listener.

use std::fmt;

/// The lifecycle state of a single connection.
///
/// `Setup -> Preparing -> Ready` is the normal start-up path. `Waiting` and
/// `Failed` can be entered from any state and always lead to teardown.
/// `Cancelled` is terminal and is the state of every released connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Setup,
    Preparing,
    Ready,
    Waiting(String),
    Failed(String),
    Cancelled,
}

impl ConnectionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionStatus::Cancelled)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Setup => write!(f, "setup"),
            ConnectionStatus::Preparing => write!(f, "preparing"),
            ConnectionStatus::Ready => write!(f, "ready"),
            ConnectionStatus::Waiting(reason) => write!(f, "waiting: {reason}"),
            ConnectionStatus::Failed(reason) => write!(f, "failed: {reason}"),
            ConnectionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The state of the accepting listener, reported independently of connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStatus {
    Setup,
    Waiting(String),
    Ready,
    Failed(String),
    Cancelled,
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerStatus::Setup => write!(f, "setup"),
            ListenerStatus::Waiting(reason) => write!(f, "waiting: {reason}"),
            ListenerStatus::Ready => write!(f, "ready"),
            ListenerStatus::Failed(reason) => write!(f, "failed: {reason}"),
            ListenerStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
