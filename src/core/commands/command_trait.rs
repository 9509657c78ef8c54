// src/core/commands/command_trait.rs

//! Defines the trait implemented by every command handler.

use super::context::CommandContext;
use crate::core::HandlerError;

/// A handler invoked once a received message matches its registration.
///
/// Handlers run synchronously on the connection's task: the next message is not
/// dispatched until `call` returns. They receive only the positional arguments;
/// the argument count is guaranteed to equal the registered arity.
pub trait CommandHandler: Send + Sync {
    fn call(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<(), HandlerError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&CommandContext<'_>, &[String]) -> Result<(), HandlerError> + Send + Sync,
{
    fn call(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<(), HandlerError> {
        self(ctx, args)
    }
}
