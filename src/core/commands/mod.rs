// src/core/commands/mod.rs

//! The command registration table and the handler contract.
//!
//! A [`CommandTable`] is built once, before any connection starts receiving,
//! and is then shared read-only by every connection. Each registration is keyed
//! by its exact (name, arity) pair.

pub mod command_trait;
pub mod context;
pub mod table;

pub use command_trait::CommandHandler;
pub use context::CommandContext;
pub use table::{CommandRegistration, CommandTable, DispatchOutcome, InvalidArgumentsHook};
