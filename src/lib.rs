// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;
pub mod server;

pub use crate::config::Config;
pub use crate::core::commands::{CommandContext, CommandTable};
pub use crate::core::{HandlerError, LineWireError};
pub use crate::server::{Server, ServerMode};
