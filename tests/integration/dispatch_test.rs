// tests/integration/dispatch_test.rs

use super::test_helpers::{TestServer, recording_table};
use linewire::connection::ListenerStatus;
use linewire::core::events::ServerEvent;
use linewire::server::ServerMode;

#[tokio::test]
async fn test_lines_framing_end_to_end() {
    let (table, calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;
    let mut client = server.connect().await;

    assert_eq!(client.request("PING\n").await, "PONG");
    assert_eq!(client.request("SET x 5\n").await, "OK");
    assert_eq!(client.request("GET x\n").await, "5");

    // Wrong arity: nothing runs, nothing is written, the connection stays up.
    client.send("SET x\n").await;
    let event = server
        .wait_for_event(|e| matches!(e, ServerEvent::UnknownCommand { .. }))
        .await;
    assert!(matches!(
        event,
        ServerEvent::UnknownCommand { ref command, arity: 1, known_name: true, .. } if command == "SET"
    ));
    assert_eq!(client.request("PING\n").await, "PONG");

    assert_eq!(
        *calls.lock(),
        vec![
            ("PING".to_string(), vec![]),
            ("SET".to_string(), vec!["x".to_string(), "5".to_string()]),
            ("GET".to_string(), vec!["x".to_string()]),
            ("PING".to_string(), vec![]),
        ]
    );
    server.stop().await;
}

#[tokio::test]
async fn test_two_messages_in_one_chunk_dispatch_in_order() {
    let (table, calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;
    let mut client = server.connect().await;

    client.send("SET a 1\nGET a\n").await;
    assert_eq!(client.read_line().await.as_deref(), Some("OK"));
    assert_eq!(client.read_line().await.as_deref(), Some("1"));

    let names: Vec<String> = calls.lock().iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(names, vec!["SET", "GET"]);
    server.stop().await;
}

#[tokio::test]
async fn test_invalid_arguments_keep_connection_open() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Single, table).await;
    let mut client = server.connect().await;

    assert_eq!(client.request("NUM abc\n").await, "ERR 'abc' is not a number");
    server
        .wait_for_event(|e| matches!(e, ServerEvent::InvalidArguments { .. }))
        .await;
    assert_eq!(client.request("NUM 12\n").await, "12");
    server.stop().await;
}

#[tokio::test]
async fn test_whole_buffer_framing_in_multi_mode() {
    let (table, calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Multi, table).await;
    let mut client = server.connect().await;

    // No terminator is needed: each receive is one message.
    assert_eq!(client.request("PING").await, "PONG");
    assert_eq!(client.request("SET greeting hello\n").await, "OK");
    assert_eq!(
        calls.lock().last().cloned(),
        Some(("SET".to_string(), vec!["greeting".into(), "hello".into()]))
    );
    server.stop().await;
}

#[tokio::test]
async fn test_decoding_fault_only_fails_that_connection() {
    let (table, _calls) = recording_table();
    let mut server = TestServer::start(ServerMode::Multi, table).await;
    let mut healthy = server.connect().await;
    let mut broken = server.connect().await;

    assert_eq!(healthy.request("PING").await, "PONG");
    broken.send_bytes(b"PING \xff\xfe").await;
    assert!(broken.is_closed_by_server().await);

    let event = server
        .wait_for_event(|e| matches!(e, ServerEvent::ConnectionClosed { .. }))
        .await;
    assert!(matches!(
        event,
        ServerEvent::ConnectionClosed { reason: linewire::core::events::CloseReason::Failed(_), .. }
    ));
    assert_eq!(healthy.request("PING").await, "PONG");
    assert_eq!(*server.status.borrow(), ListenerStatus::Ready);
    server.stop().await;
}
