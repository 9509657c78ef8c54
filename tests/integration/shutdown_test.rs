// tests/integration/shutdown_test.rs

use super::test_helpers::{TestServer, recording_table};
use linewire::config::{Config, MetricsConfig};
use linewire::connection::{ConnectionStatus, ListenerStatus};
use linewire::core::events::{CloseReason, ServerEvent};
use linewire::server::{Server, ServerMode};
use linewire::core::commands::CommandTable;
use linewire::core::events::ChannelSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_stop_cancels_live_connections() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Multi, table).await;
    let mut client = server.connect().await;
    assert_eq!(client.request("PING").await, "PONG");

    let handle = server
        .clients
        .iter()
        .next()
        .map(|entry| entry.value().clone())
        .unwrap();
    assert_eq!(handle.status(), ConnectionStatus::Ready);

    server.stop().await;
    assert!(client.is_closed_by_server().await);
    assert_eq!(handle.status(), ConnectionStatus::Cancelled);
    assert_eq!(*server.status.borrow(), ListenerStatus::Cancelled);
    assert!(server.clients.is_empty());

    let events = server.drain_events();
    assert!(events.contains(&ServerEvent::ConnectionClosed {
        id: 1,
        reason: CloseReason::Stopped
    }));
    assert_eq!(
        events.last(),
        Some(&ServerEvent::ListenerStatusChanged(ListenerStatus::Cancelled))
    );
}

#[tokio::test]
async fn test_server_pushes_lines_through_a_handle() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;
    let mut client = server.connect().await;
    assert_eq!(client.request("PING\n").await, "PONG");

    let handle = server.clients.get(&1).map(|h| h.value().clone()).unwrap();
    handle.send_string_confirmed("NOTICE hello").await.unwrap();
    assert_eq!(client.read_line().await.as_deref(), Some("NOTICE hello"));

    handle.cancel();
    assert!(client.is_closed_by_server().await);
    handle.closed().await;
    server.stop().await;
}

#[tokio::test]
async fn test_bind_failure_reports_failed_status() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = Config {
        host: "127.0.0.1".into(),
        port,
        ..Config::default()
    };
    let result = Server::bind(config, CommandTable::new(), Arc::new(ChannelSink::new(tx))).await;
    assert!(result.is_err());

    assert_eq!(
        rx.try_recv().unwrap(),
        ServerEvent::ListenerStatusChanged(ListenerStatus::Setup)
    );
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerEvent::ListenerStatusChanged(ListenerStatus::Failed(_))
    ));
}

#[tokio::test]
async fn test_failed_metrics_server_fails_the_run() {
    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let metrics_port = occupied.local_addr().unwrap().port();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = Config {
        host: "127.0.0.1".into(),
        port: 0,
        metrics: MetricsConfig {
            enabled: true,
            port: metrics_port,
        },
        ..Config::default()
    };
    let server = Server::bind(config, CommandTable::new(), Arc::new(ChannelSink::new(tx)))
        .await
        .unwrap();
    let status = server.status();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        server.run_until(std::future::pending()),
    )
    .await
    .expect("run_until should return once the metrics server fails");

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("metrics server"), "{err:#}");
    assert_eq!(*status.borrow(), ListenerStatus::Cancelled);

    let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(
        events.last(),
        Some(&ServerEvent::ListenerStatusChanged(ListenerStatus::Cancelled))
    );
    drop(occupied);
}
