// src/core/errors.rs

//! Defines the error types shared by the server, its connections and command handlers.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every failure the framework itself can produce.
#[derive(Error, Debug)]
pub enum LineWireError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A second registration was attempted for an existing (name, arity) pair.
    #[error("Command '{name}' with arity {arity} is already registered")]
    DuplicateRegistration { name: String, arity: usize },

    #[error("Invalid command name '{0}'")]
    InvalidCommandName(String),

    /// The received bytes are not valid UTF-8 text.
    #[error("Received bytes are not valid UTF-8 text")]
    Decoding,

    #[error("Line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    /// The connection's transport has already been released.
    #[error("Connection is closed")]
    ConnectionClosed,
}

// `std::io::Error` is not cloneable, so it is shared behind an `Arc`.
impl Clone for LineWireError {
    fn clone(&self) -> Self {
        match self {
            LineWireError::Io(e) => LineWireError::Io(Arc::clone(e)),
            LineWireError::DuplicateRegistration { name, arity } => {
                LineWireError::DuplicateRegistration {
                    name: name.clone(),
                    arity: *arity,
                }
            }
            LineWireError::InvalidCommandName(s) => LineWireError::InvalidCommandName(s.clone()),
            LineWireError::Decoding => LineWireError::Decoding,
            LineWireError::LineTooLong(n) => LineWireError::LineTooLong(*n),
            LineWireError::ConnectionClosed => LineWireError::ConnectionClosed,
        }
    }
}

impl PartialEq for LineWireError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LineWireError::Io(e1), LineWireError::Io(e2)) => e1.kind() == e2.kind(),
            (
                LineWireError::DuplicateRegistration { name: n1, arity: a1 },
                LineWireError::DuplicateRegistration { name: n2, arity: a2 },
            ) => n1 == n2 && a1 == a2,
            (LineWireError::InvalidCommandName(s1), LineWireError::InvalidCommandName(s2)) => {
                s1 == s2
            }
            (LineWireError::LineTooLong(n1), LineWireError::LineTooLong(n2)) => n1 == n2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl LineWireError {
    /// Returns true for an I/O error that only says the stream ended early.
    /// Resets and aborts carry an error and are not ordinary disconnects.
    pub fn is_normal_disconnect(&self) -> bool {
        matches!(self, LineWireError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

impl From<std::io::Error> for LineWireError {
    fn from(e: std::io::Error) -> Self {
        LineWireError::Io(Arc::new(e))
    }
}

impl From<std::str::Utf8Error> for LineWireError {
    fn from(_: std::str::Utf8Error) -> Self {
        LineWireError::Decoding
    }
}

/// The failure a command handler may report back to the dispatcher.
///
/// Neither variant terminates the connection.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The argument count matched, but the values themselves were rejected.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Any other failure raised while the handler ran.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Convenience constructor for `InvalidArguments`.
    pub fn invalid(reason: impl Into<String>) -> Self {
        HandlerError::InvalidArguments(reason.into())
    }
}

impl From<LineWireError> for HandlerError {
    fn from(e: LineWireError) -> Self {
        HandlerError::Internal(anyhow::Error::new(e))
    }
}

impl From<std::num::ParseIntError> for HandlerError {
    fn from(e: std::num::ParseIntError) -> Self {
        HandlerError::InvalidArguments(e.to_string())
    }
}
