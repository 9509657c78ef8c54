// src/core/mod.rs

//! The central module containing the protocol, command table and observability
//! types shared by the server and its connections.

pub mod commands;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod protocol;

pub use commands::{CommandContext, CommandTable, DispatchOutcome};
pub use errors::{HandlerError, LineWireError};
pub use events::{EventSink, ServerEvent};
pub use protocol::Message;
