// src/connection/transport.rs

//! The byte-stream abstraction a connection runs over.

use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A reliable, ordered, bidirectional byte stream.
///
/// Receiving, sending and cancellation come from `AsyncRead`, `AsyncWrite`
/// and `AsyncWriteExt::shutdown` plus drop; end of stream is a zero-length
/// read. The trait only adds what a connection needs to describe its peer.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// The remote address, if the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

impl Transport for DuplexStream {}

#[cfg(unix)]
impl Transport for tokio::net::UnixStream {}
