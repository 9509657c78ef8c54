// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::{Connection, ConnectionGuard, ListenerStatus};
use crate::core::events::ServerEvent;
use crate::core::metrics;
use anyhow::{Result, anyhow};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// How long shutdown waits for connections to finish their teardown.
const CLIENT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Pause after a failed accept, so a persistent fault does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The main server loop. Accepts connections until `shutdown` resolves or a
/// background task fails, then stops every live connection.
///
/// Returns the background task's error if that is what ended the loop.
pub async fn run(mut ctx: ServerContext, shutdown: impl Future<Output = ()>) -> Result<()> {
    let mut connection_id_counter: u64 = 0;
    let mut fatal: Option<anyhow::Error> = None;
    let mut client_tasks = JoinSet::new();
    let mut accept_faulted = false;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, stopping the listener.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => {
                        error!("CRITICAL: Background task failed: {}. Shutting down.", e);
                        fatal = Some(e.context("background task failed"));
                        break;
                    }
                    Err(e) => {
                        error!("CRITICAL: Background task panicked: {e:?}. Shutting down.");
                        fatal = Some(anyhow!("background task panicked: {e}"));
                        break;
                    }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        if accept_faulted {
                            accept_faulted = false;
                            ctx.set_status(ListenerStatus::Ready);
                        }
                        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

                        connection_id_counter = connection_id_counter.wrapping_add(1);
                        let id = connection_id_counter;

                        let lease = match ctx.admission.try_admit(id) {
                            Ok(lease) => lease,
                            Err(reason) => {
                                metrics::CONNECTIONS_REJECTED_TOTAL.inc();
                                ctx.events.emit(ServerEvent::ConnectionRejected { peer: addr, reason });
                                // Dropping the socket closes it immediately.
                                drop(socket);
                                continue;
                            }
                        };

                        if let Err(e) = socket.set_nodelay(true) {
                            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        ctx.events.emit(ServerEvent::ConnectionAccepted { id, peer: addr });

                        let mut connection = Connection::new(
                            id,
                            socket,
                            ctx.table.clone(),
                            ctx.events.clone(),
                            &ctx.settings,
                        )
                        .with_lease(lease);
                        let guard = ConnectionGuard::new(ctx.clients.clone(), connection.handle(), addr);

                        client_tasks.spawn(
                            async move {
                                let _guard = guard;
                                connection.run().await
                            }
                            .instrument(info_span!("connection", id, peer = %addr)),
                        );
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        accept_faulted = true;
                        ctx.set_status(ListenerStatus::Waiting(e.to_string()));
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res && e.is_panic() {
                    error!("A connection task panicked: {e:?}");
                }
            },
        }
    }

    // Stop accepting before tearing down what is already connected.
    drop(ctx.listener);

    info!(
        "Stopping {} live connection(s).",
        ctx.clients.len()
    );
    for entry in ctx.clients.iter() {
        entry.value().cancel();
    }
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No background task was listening for the shutdown signal.");
    }

    if tokio::time::timeout(CLIENT_SHUTDOWN_GRACE, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connections to close, aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };

    ctx.status_tx.send_replace(ListenerStatus::Cancelled);
    ctx.events
        .emit(ServerEvent::ListenerStatusChanged(ListenerStatus::Cancelled));
    info!("Server shutdown complete.");

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
                    _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to register signal handlers: {}. Falling back to Ctrl-C.", e);
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, initiating graceful shutdown."),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}. Only an explicit stop will end the server.", e);
            std::future::pending::<()>().await;
        }
    }
}
