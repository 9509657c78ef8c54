// src/core/protocol/message.rs

//! Splits received text into discrete command messages.
//!
//! A message is a run of whitespace-separated tokens. The first token is the
//! command name and every following token is a positional argument. Empty
//! tokens produced by repeated delimiters are discarded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parsed command with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: String,
    pub args: Vec<String>,
}

impl Message {
    /// Creates a message from a command name and its arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// The number of positional arguments carried by this message.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a received buffer is cut into messages.
///
/// The two policies are not interchangeable: clients written against one
/// framing will misbehave under the other.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FramingPolicy {
    /// The whole receive buffer is one message. Only the leading token is the
    /// command; everything after it, embedded newlines included, becomes
    /// arguments.
    WholeBuffer,
    /// The buffer is split on newlines first and each line is parsed as its
    /// own message.
    Lines,
}

impl fmt::Display for FramingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingPolicy::WholeBuffer => write!(f, "whole-buffer"),
            FramingPolicy::Lines => write!(f, "lines"),
        }
    }
}

/// Parses one message from `text`. Returns `None` if `text` holds no tokens.
pub fn parse_message(text: &str) -> Option<Message> {
    let mut tokens = text.split_whitespace();
    let command = tokens.next()?;
    Some(Message {
        command: command.to_string(),
        args: tokens.map(str::to_string).collect(),
    })
}

/// Parses every message contained in `text` according to `policy`.
pub fn parse_buffer(text: &str, policy: FramingPolicy) -> Vec<Message> {
    match policy {
        FramingPolicy::WholeBuffer => parse_message(text).into_iter().collect(),
        FramingPolicy::Lines => text.lines().filter_map(parse_message).collect(),
    }
}
