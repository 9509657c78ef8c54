// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: framing, the status
//! state machine, command dispatch and transport release.

mod guard;
mod handle;
mod handler;
mod status;
mod transport;

pub use guard::ConnectionGuard;
pub use handle::ConnectionHandle;
pub use handler::{Connection, ConnectionSettings};
pub use status::{ConnectionStatus, ListenerStatus};
pub use transport::Transport;
