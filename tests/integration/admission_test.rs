// tests/integration/admission_test.rs

use super::test_helpers::{TestServer, recording_table};
use linewire::config::Config;
use linewire::core::events::ServerEvent;
use linewire::server::{RejectReason, ServerMode};

#[tokio::test]
async fn test_single_client_rejects_while_busy_then_admits() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;

    let mut a = server.connect().await;
    assert_eq!(a.request("PING\n").await, "PONG");
    assert_eq!(server.admission.active_connection(), Some(1));

    // B is turned away and A is unaffected.
    let mut b = server.connect().await;
    let event = server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionRejected { .. }))
        .await;
    assert!(matches!(
        event,
        ServerEvent::ConnectionRejected { reason: RejectReason::Busy { active: 1 }, .. }
    ));
    assert!(b.is_closed_by_server().await);
    assert_eq!(a.request("PING\n").await, "PONG");
    assert_eq!(server.admission.active_connection(), Some(1));

    // A ends; the slot is free by the time its close is reported.
    drop(a);
    server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionClosed { id: 1, .. }))
        .await;
    assert_eq!(server.admission.active_connection(), None);

    let mut c = server.connect().await;
    assert_eq!(c.request("PING\n").await, "PONG");
    assert_eq!(server.admission.active_connection(), Some(3));
    server.stop().await;
}

#[tokio::test]
async fn test_quit_frees_the_single_slot() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;

    let mut a = server.connect().await;
    assert_eq!(a.request("QUIT\n").await, "BYE");
    assert!(a.is_closed_by_server().await);
    server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionClosed { id: 1, .. }))
        .await;

    let mut b = server.connect().await;
    assert_eq!(b.request("PING\n").await, "PONG");
    server.stop().await;
}

#[tokio::test]
async fn test_multi_client_serves_concurrently_up_to_max_clients() {
    let (table, _calls) = recording_table();
    let config = Config {
        mode: ServerMode::Multi,
        max_clients: 2,
        ..Config::default()
    };
    let mut server = TestServer::with_config(config, table).await;

    let mut a = server.connect().await;
    let mut b = server.connect().await;
    assert_eq!(a.request("SET k a").await, "OK");
    assert_eq!(b.request("GET k").await, "a");
    assert_eq!(server.clients.len(), 2);

    let mut c = server.connect().await;
    let event = server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionRejected { .. }))
        .await;
    assert!(matches!(
        event,
        ServerEvent::ConnectionRejected { reason: RejectReason::MaxClients(2), .. }
    ));
    assert!(c.is_closed_by_server().await);

    drop(a);
    server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionClosed { id: 1, .. }))
        .await;
    let mut d = server.connect().await;
    assert_eq!(d.request("PING").await, "PONG");
    server.stop().await;
}
