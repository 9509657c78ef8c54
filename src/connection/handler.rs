// src/connection/handler.rs

//! Defines `Connection`, the state machine that owns one transport, runs its
//! receive loop and dispatches every parsed message to the command table.

use super::handle::{ConnectionHandle, Outbound};
use super::status::ConnectionStatus;
use super::transport::Transport;
use crate::core::commands::{CommandContext, CommandTable, DispatchOutcome};
use crate::core::events::{CloseReason, EventSink, ServerEvent};
use crate::core::metrics;
use crate::core::protocol::codec::{DEFAULT_MAX_LINE, MAX_READ_CHUNK};
use crate::core::protocol::{CommandCodec, FramingPolicy, Message};
use crate::core::LineWireError;
use crate::server::SlotLease;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, error::Elapsed, timeout_at};
use tokio_util::codec::Framed;
use tracing::debug;

/// Per-connection framing and timing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub framing: FramingPolicy,
    /// Upper bound of a single receive, `1..=512`.
    pub read_chunk_bytes: usize,
    /// Upper bound of an unterminated line under the lines policy.
    pub max_line_bytes: usize,
    /// Tear the connection down after this long without inbound data.
    pub idle_timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn new(framing: FramingPolicy) -> Self {
        Self {
            framing,
            read_chunk_bytes: MAX_READ_CHUNK,
            max_line_bytes: DEFAULT_MAX_LINE,
            idle_timeout: None,
        }
    }
}

/// Owns one transport and drives it from `Setup` to `Cancelled`.
pub struct Connection<T: Transport> {
    id: u64,
    peer: Option<SocketAddr>,
    framed: Option<Framed<T, CommandCodec>>,
    table: Arc<CommandTable>,
    events: Arc<dyn EventSink>,
    handle: ConnectionHandle,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    kill_rx: broadcast::Receiver<()>,
    status_tx: watch::Sender<ConnectionStatus>,
    idle_timeout: Option<Duration>,
    lease: Option<SlotLease>,
}

impl<T: Transport> Connection<T> {
    /// Wraps `transport` in a new connection in the `Setup` state.
    pub fn new(
        id: u64,
        transport: T,
        table: Arc<CommandTable>,
        events: Arc<dyn EventSink>,
        settings: &ConnectionSettings,
    ) -> Self {
        let peer = transport.peer_addr();
        let codec = CommandCodec::new(
            settings.framing,
            settings.read_chunk_bytes,
            settings.max_line_bytes,
        );
        let capacity = codec.read_chunk();
        let (handle, receivers) = ConnectionHandle::new(id, peer);
        let connection = Self {
            id,
            peer,
            framed: Some(Framed::with_capacity(transport, codec, capacity)),
            table,
            events,
            handle,
            outbound_rx: receivers.outbound_rx,
            kill_rx: receivers.kill_rx,
            status_tx: receivers.status_tx,
            idle_timeout: settings.idle_timeout,
            lease: None,
        };
        connection.events.emit(ServerEvent::ConnectionStatusChanged {
            id,
            status: ConnectionStatus::Setup,
        });
        connection
    }

    /// Attaches the admission lease that must be returned when this connection ends.
    pub fn with_lease(mut self, lease: SlotLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Returns true once the transport has been released.
    pub fn is_released(&self) -> bool {
        self.framed.is_none()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status.clone());
        self.events.emit(ServerEvent::ConnectionStatusChanged {
            id: self.id,
            status,
        });
    }

    /// Runs the receive loop until the peer closes, the transport fails, or the
    /// connection is stopped. The transport is always released on return.
    ///
    /// Each received chunk is parsed and its messages are dispatched in order.
    /// Replies queued while dispatching are written before the next receive.
    pub async fn run(&mut self) -> CloseReason {
        if self.framed.is_none() {
            return CloseReason::Stopped;
        }
        self.set_status(ConnectionStatus::Preparing);
        self.set_status(ConnectionStatus::Ready);

        let mut idle_deadline = self.idle_timeout.map(|d| Instant::now() + d);

        let reason = loop {
            let Some(framed) = self.framed.as_mut() else {
                break CloseReason::Stopped;
            };

            tokio::select! {
                // Prioritize stop requests, then pending replies, then input.
                biased;
                _ = self.kill_rx.recv() => {
                    debug!("Connection {} received stop request.", self.id);
                    break self.on_stop().await;
                }
                Some(outbound) = self.outbound_rx.recv() => {
                    self.write_replies(Some(outbound)).await;
                }
                next = next_batch(framed, idle_deadline) => match next {
                    Ok(Some(Ok(batch))) => {
                        debug!("Connection {}: received {} message(s).", self.id, batch.len());
                        self.dispatch_batch(&batch);
                        self.write_replies(None).await;
                        idle_deadline = self.idle_timeout.map(|d| Instant::now() + d);
                    }
                    Ok(Some(Err(e))) if e.is_normal_disconnect() => {
                        debug!("Connection {} closed by peer: {}", self.id, e);
                        break self.on_end().await;
                    }
                    Ok(Some(Err(LineWireError::Io(e)))) if e.kind() == std::io::ErrorKind::TimedOut => {
                        break self.fail_with(ConnectionStatus::Waiting(e.to_string())).await;
                    }
                    Ok(Some(Err(e))) => {
                        break self.on_failure(e.to_string()).await;
                    }
                    Ok(None) => {
                        break self.on_end().await;
                    }
                    Err(_) => {
                        break self.fail_with(ConnectionStatus::Waiting("idle timeout".into())).await;
                    }
                }
            }
        };

        self.events.emit(ServerEvent::ConnectionClosed {
            id: self.id,
            reason: reason.clone(),
        });
        reason
    }

    /// Matches each message against the table and invokes its handler, in order.
    fn dispatch_batch(&self, batch: &[Message]) {
        for message in batch {
            let ctx = CommandContext::new(&message.command, &self.handle);
            let outcome = self.table.dispatch(&ctx, message);
            if outcome != DispatchOutcome::UnknownCommand {
                metrics::COMMANDS_PROCESSED_TOTAL.inc();
            }
            let event = match outcome {
                DispatchOutcome::Handled => ServerEvent::CommandDispatched {
                    id: self.id,
                    command: message.command.clone(),
                    arity: message.arity(),
                },
                DispatchOutcome::UnknownCommand => {
                    metrics::UNKNOWN_COMMANDS_TOTAL.inc();
                    ServerEvent::UnknownCommand {
                        id: self.id,
                        command: message.command.clone(),
                        arity: message.arity(),
                        known_name: self.table.knows(&message.command),
                    }
                }
                DispatchOutcome::InvalidArguments(reason) => {
                    metrics::HANDLER_ERRORS_TOTAL.inc();
                    ServerEvent::InvalidArguments {
                        id: self.id,
                        command: message.command.clone(),
                        reason,
                    }
                }
                DispatchOutcome::HandlerFailed(error) => {
                    metrics::HANDLER_ERRORS_TOTAL.inc();
                    ServerEvent::HandlerFailed {
                        id: self.id,
                        command: message.command.clone(),
                        error,
                    }
                }
            };
            self.events.emit(event);
        }
    }

    /// Writes `first` and every other queued reply, then flushes once.
    async fn write_replies(&mut self, first: Option<Outbound>) {
        let mut pending: Vec<Outbound> = first.into_iter().collect();
        while let Ok(outbound) = self.outbound_rx.try_recv() {
            pending.push(outbound);
        }
        if pending.is_empty() {
            return;
        }

        let Some(framed) = self.framed.as_mut() else {
            for outbound in pending {
                if let Some(ack) = outbound.ack {
                    let _ = ack.send(Err(LineWireError::ConnectionClosed));
                }
            }
            return;
        };

        let mut acks = Vec::new();
        let mut result = Ok(());
        for outbound in pending {
            if result.is_ok() {
                result = framed.feed(outbound.line).await;
            }
            acks.extend(outbound.ack);
        }
        if result.is_ok() {
            result = framed.flush().await;
        }

        if let Err(e) = &result {
            self.events.emit(ServerEvent::SendFailed {
                id: self.id,
                error: e.to_string(),
            });
        }
        for ack in acks {
            // The sender may have stopped waiting.
            let _ = ack.send(result.clone());
        }
    }

    /// Failure path: records `reason` as `Failed` and releases the transport.
    pub async fn on_failure(&mut self, reason: impl Into<String>) -> CloseReason {
        self.fail_with(ConnectionStatus::Failed(reason.into())).await
    }

    async fn fail_with(&mut self, status: ConnectionStatus) -> CloseReason {
        let reason = match &status {
            ConnectionStatus::Waiting(reason) | ConnectionStatus::Failed(reason) => reason.clone(),
            other => other.to_string(),
        };
        self.set_status(status);
        self.release().await;
        CloseReason::Failed(reason)
    }

    /// End path: the peer closed the stream cleanly.
    pub async fn on_end(&mut self) -> CloseReason {
        self.release().await;
        CloseReason::EndOfStream
    }

    async fn on_stop(&mut self) -> CloseReason {
        self.write_replies(None).await;
        self.release().await;
        CloseReason::Stopped
    }

    /// Releases the transport and the admission lease, then moves to `Cancelled`.
    ///
    /// Returns false, and does nothing, if the transport was already released.
    pub async fn release(&mut self) -> bool {
        let Some(framed) = self.framed.take() else {
            return false;
        };

        // Free the admission slot before the peer can observe the close.
        drop(self.lease.take());

        self.outbound_rx.close();
        while let Ok(outbound) = self.outbound_rx.try_recv() {
            if let Some(ack) = outbound.ack {
                let _ = ack.send(Err(LineWireError::ConnectionClosed));
            }
        }

        let mut transport = framed.into_inner();
        if let Err(e) = transport.shutdown().await {
            debug!("Connection {}: transport shutdown error: {}", self.id, e);
        }
        drop(transport);

        self.set_status(ConnectionStatus::Cancelled);
        true
    }
}

/// Waits for the next decoded batch, giving up at `deadline` if one is set.
async fn next_batch<T: Transport>(
    framed: &mut Framed<T, CommandCodec>,
    deadline: Option<Instant>,
) -> Result<Option<Result<Vec<Message>, LineWireError>>, Elapsed> {
    match deadline {
        Some(deadline) => timeout_at(deadline, framed.next()).await,
        None => Ok(framed.next().await),
    }
}
