// src/core/commands/context.rs

use crate::connection::ConnectionHandle;
use std::net::SocketAddr;

/// Per-invocation view of the connection a command arrived on.
pub struct CommandContext<'a> {
    command: &'a str,
    handle: &'a ConnectionHandle,
}

impl<'a> CommandContext<'a> {
    pub fn new(command: &'a str, handle: &'a ConnectionHandle) -> Self {
        Self { command, handle }
    }

    /// The matched command name.
    pub fn command(&self) -> &str {
        self.command
    }

    pub fn connection_id(&self) -> u64 {
        self.handle.id()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.handle.peer()
    }

    /// Queues `line` as a reply. The line terminator is appended on write.
    ///
    /// Replies queued by a handler are written before the connection reads its
    /// next chunk of input.
    pub fn send_string(&self, line: impl Into<String>) {
        self.handle.send_string(line);
    }

    /// Asks the connection to close once the current batch has been dispatched
    /// and any queued replies have been written.
    pub fn close(&self) {
        self.handle.cancel();
    }

    /// A cloneable handle to the connection, usable from other tasks.
    pub fn handle(&self) -> &ConnectionHandle {
        self.handle
    }
}
