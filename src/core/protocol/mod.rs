// src/core/protocol/mod.rs

//! The text wire protocol: message parsing and the framing codec.

pub mod codec;
pub mod message;
pub use codec::CommandCodec;
pub use message::{FramingPolicy, Message, parse_buffer, parse_message};
