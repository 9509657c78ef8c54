// src/core/commands/table.rs

//! The ordered registration table and the dispatcher that invokes handlers.

use super::command_trait::CommandHandler;
use super::context::CommandContext;
use crate::core::protocol::Message;
use crate::core::{HandlerError, LineWireError};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// A hook invoked whenever a handler rejects its argument values. It receives the
/// invocation context and the handler's reason, and may for example send an
/// error line back to the peer.
pub type InvalidArgumentsHook = Arc<dyn Fn(&CommandContext<'_>, &str) + Send + Sync>;

/// One (name, arity, handler) entry of a [`CommandTable`].
#[derive(Clone)]
pub struct CommandRegistration {
    pub name: String,
    pub arity: usize,
    pub handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// The result of dispatching a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler matched and returned successfully.
    Handled,
    /// No registration matches the command name and argument count.
    UnknownCommand,
    /// The handler rejected the argument values.
    InvalidArguments(String),
    /// The handler failed for any other reason, including a panic.
    HandlerFailed(String),
}

/// An ordered set of command registrations with exact (name, arity) lookup.
#[derive(Default, Clone)]
pub struct CommandTable {
    registrations: Vec<CommandRegistration>,
    invalid_arguments_hook: Option<InvalidArgumentsHook>,
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("registrations", &self.registrations)
            .field("has_invalid_arguments_hook", &self.invalid_arguments_hook.is_some())
            .finish()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure handler for the exact (`name`, `arity`) pair.
    ///
    /// Fails with `DuplicateRegistration` if the pair is already taken, and with
    /// `InvalidCommandName` if `name` is empty or contains whitespace.
    pub fn register<F>(
        &mut self,
        name: &str,
        arity: usize,
        handler: F,
    ) -> Result<&mut Self, LineWireError>
    where
        F: Fn(&CommandContext<'_>, &[String]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(name, arity, Arc::new(handler))
    }

    /// Registers an already shared handler for the exact (`name`, `arity`) pair.
    pub fn register_handler(
        &mut self,
        name: &str,
        arity: usize,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<&mut Self, LineWireError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(LineWireError::InvalidCommandName(name.to_string()));
        }
        if self.find(name, arity).is_some() {
            return Err(LineWireError::DuplicateRegistration {
                name: name.to_string(),
                arity,
            });
        }
        self.registrations.push(CommandRegistration {
            name: name.to_string(),
            arity,
            handler,
        });
        Ok(self)
    }

    /// Installs the hook called when a handler reports `InvalidArguments`.
    pub fn on_invalid_arguments<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&CommandContext<'_>, &str) + Send + Sync + 'static,
    {
        self.invalid_arguments_hook = Some(Arc::new(hook));
        self
    }

    /// Looks up the registration matching `name` and `arity` exactly.
    pub fn find(&self, name: &str, arity: usize) -> Option<&CommandRegistration> {
        self.registrations
            .iter()
            .find(|r| r.arity == arity && r.name == name)
    }

    /// Returns true if any registration uses `name`, regardless of arity.
    pub fn knows(&self, name: &str) -> bool {
        self.registrations.iter().any(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandRegistration> {
        self.registrations.iter()
    }

    /// Matches `message` against the table and invokes the handler, if any.
    ///
    /// Handler failures and panics are contained here; none of them propagate to
    /// the caller.
    pub fn dispatch(&self, ctx: &CommandContext<'_>, message: &Message) -> DispatchOutcome {
        let Some(registration) = self.find(&message.command, message.arity()) else {
            return DispatchOutcome::UnknownCommand;
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            registration.handler.call(ctx, &message.args)
        }));

        match result {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(HandlerError::InvalidArguments(reason))) => {
                let Some(hook) = &self.invalid_arguments_hook else {
                    return DispatchOutcome::InvalidArguments(reason);
                };
                // The hook is user code too and gets the same containment.
                match catch_unwind(AssertUnwindSafe(|| hook(ctx, &reason))) {
                    Ok(()) => DispatchOutcome::InvalidArguments(reason),
                    Err(payload) => DispatchOutcome::HandlerFailed(panic_message(
                        "invalid-arguments hook",
                        payload.as_ref(),
                    )),
                }
            }
            Ok(Err(HandlerError::Internal(e))) => DispatchOutcome::HandlerFailed(format!("{e:#}")),
            Err(payload) => {
                DispatchOutcome::HandlerFailed(panic_message("handler", payload.as_ref()))
            }
        }
    }
}

fn panic_message(source: &str, payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("{source} panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("{source} panicked: {s}")
    } else {
        format!("{source} panicked")
    }
}
