//! Gateway client end-to-end tests
//!
//! A fake gateway on localhost speaks the protocol over a real WebSocket.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use gateway_client::{ClientEvent, ConnectionState, GatewayClient, WsConnector};
use gateway_core::{CloseCode, GatewayPayload, Intents, OpCode};
use integration_tests::*;
use tokio::sync::mpsc;

const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Start a client and walk it through identify and READY
async fn establish(
    gateway: &mut FakeGateway,
    session_id: &str,
) -> (GatewayClient, mpsc::Receiver<ClientEvent>, GatewayPeer) {
    let (client, mut events) =
        GatewayClient::spawn(test_options(&gateway.url).unwrap(), WsConnector::new());
    client.start(test_credential()).await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    peer.hello(HEARTBEAT_INTERVAL_MS).await.unwrap();
    let identify = peer.expect(OpCode::Identify).await.unwrap();
    let identify = identify.as_identify().unwrap();
    assert_eq!(identify.token, TEST_TOKEN);
    assert_eq!(identify.intents, Intents::DEFAULT.bits());
    assert!(!identify.compress);

    peer.send(&ready(session_id, &gateway.url, 1)).await.unwrap();
    assert_eq!(next_event(&mut events).await.unwrap(), ClientEvent::Connected);
    assert_eq!(
        next_event(&mut events).await.unwrap(),
        ClientEvent::Ready {
            session_id: session_id.to_string()
        }
    );

    (client, events, peer)
}

// ============================================================================
// Identify, dispatch and resume
// ============================================================================

#[tokio::test]
async fn test_identify_dispatch_and_resume() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let session_id = format!("sess-{}", unique_suffix());
    let (client, mut events, mut peer) = establish(&mut gateway, &session_id).await;

    assert!(peer.is_compressed());
    assert!(peer.request_uri.contains("v=10"));
    assert!(peer.request_uri.contains("encoding=json"));

    // Only the last of three frames carries the flush marker
    peer.send_split(&message_create(5, "hello"), 3).await.unwrap();

    let mut dispatches = Vec::new();
    while dispatches.len() < 2 {
        if let ClientEvent::Dispatch(event) = next_event(&mut events).await.unwrap() {
            dispatches.push(event);
        }
    }
    assert_eq!(dispatches[0].name, "READY");
    assert_eq!(dispatches[1].name, "MESSAGE_CREATE");
    assert_eq!(dispatches[1].sequence, Some(5));
    assert_eq!(dispatches[1].data["content"], "hello");

    // Abrupt drop, no close frame
    drop(peer);
    assert_eq!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Disconnected {
            code: None,
            resumable: true
        }
    );
    assert!(matches!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Reconnecting { attempt: 1, .. }
    ));

    let mut peer = gateway.accept().await.unwrap();
    assert!(peer.is_compressed());
    peer.hello(HEARTBEAT_INTERVAL_MS).await.unwrap();
    let resume = peer.expect(OpCode::Resume).await.unwrap();
    let resume = resume.as_resume().unwrap();
    assert_eq!(resume.token, TEST_TOKEN);
    assert_eq!(resume.session_id, session_id);
    assert_eq!(resume.seq, Some(5));

    peer.send(&GatewayPayload::dispatch("RESUMED", 6, serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(next_lifecycle(&mut events).await.unwrap(), ClientEvent::Connected);
    assert_eq!(next_lifecycle(&mut events).await.unwrap(), ClientEvent::Resumed);

    let mut status = client.subscribe();
    let sequence = status
        .wait_for(|s| s.state == ConnectionState::Established)
        .await
        .unwrap()
        .sequence;
    assert_eq!(sequence, Some(6));

    client.close(CloseCode::NORMAL).await.unwrap();
    assert_eq!(peer.expect_close().await.unwrap(), Some(CloseCode::NORMAL));
    assert_eq!(next_lifecycle(&mut events).await.unwrap(), ClientEvent::Closed);

    // Explicit close is terminal
    assert!(!gateway.connects_within(Duration::from_millis(500)).await);
    client.shutdown().await;
}

// ============================================================================
// Session invalidation
// ============================================================================

#[tokio::test]
async fn test_invalid_session_forces_identify() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let session_id = format!("sess-{}", unique_suffix());
    let (client, mut events, mut peer) = establish(&mut gateway, &session_id).await;

    peer.send(&message_create(2, "before")).await.unwrap();
    peer.send(&GatewayPayload::invalid_session(false))
        .await
        .unwrap();

    assert_eq!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::SessionInvalidated
    );
    assert_eq!(peer.expect_close().await.unwrap(), Some(CloseCode::RESUMABLE));

    let mut peer = gateway.accept().await.unwrap();
    peer.hello(HEARTBEAT_INTERVAL_MS).await.unwrap();
    peer.expect(OpCode::Identify).await.unwrap();

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let session_id = format!("sess-{}", unique_suffix());
    let (client, _events, mut peer) = establish(&mut gateway, &session_id).await;

    peer.send(&GatewayPayload::reconnect()).await.unwrap();
    assert_eq!(peer.expect_close().await.unwrap(), Some(CloseCode::RESUMABLE));

    let mut peer = gateway.accept().await.unwrap();
    peer.hello(HEARTBEAT_INTERVAL_MS).await.unwrap();
    let resume = peer.expect(OpCode::Resume).await.unwrap();
    assert_eq!(resume.as_resume().unwrap().session_id, session_id);

    client.shutdown().await;
}

// ============================================================================
// Close codes
// ============================================================================

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let session_id = format!("sess-{}", unique_suffix());
    let (client, mut events, mut peer) = establish(&mut gateway, &session_id).await;

    peer.close(4004).await.unwrap();
    assert_eq!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Disconnected {
            code: Some(4004),
            resumable: false
        }
    );
    assert!(matches!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Error(_)
    ));

    assert!(!gateway.connects_within(Duration::from_millis(500)).await);
    assert_eq!(client.status().state, ConnectionState::Disconnected);
    client.shutdown().await;
}

#[tokio::test]
async fn test_session_timeout_reidentifies() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let session_id = format!("sess-{}", unique_suffix());
    let (client, mut events, mut peer) = establish(&mut gateway, &session_id).await;

    peer.close(4009).await.unwrap();
    assert!(matches!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Disconnected {
            code: Some(4009),
            resumable: false
        }
    ));
    assert_eq!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::SessionInvalidated
    );

    let mut peer = gateway.accept().await.unwrap();
    peer.hello(HEARTBEAT_INTERVAL_MS).await.unwrap();
    peer.expect(OpCode::Identify).await.unwrap();

    client.shutdown().await;
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test]
async fn test_heartbeat_is_acknowledged() {
    let mut gateway = FakeGateway::start().await.unwrap();
    let (client, mut events) =
        GatewayClient::spawn(test_options(&gateway.url).unwrap(), WsConnector::new());
    client.start(test_credential()).await.unwrap();

    let mut peer = gateway.accept().await.unwrap();
    peer.hello(100).await.unwrap();
    peer.expect(OpCode::Identify).await.unwrap();
    peer.send(&ready("sess-hb", &gateway.url, 1)).await.unwrap();

    // The first beat may race READY; later ones carry its sequence
    let mut last = None;
    for _ in 0..3 {
        let beat = peer.expect(OpCode::Heartbeat).await.unwrap();
        peer.send(&GatewayPayload::heartbeat_ack()).await.unwrap();
        last = Some(beat.d);
    }
    assert_eq!(last, Some(serde_json::json!(1)));

    let mut status = client.subscribe();
    let latency = status.wait_for(|s| s.latency.is_some()).await.unwrap().latency;
    assert!(latency.is_some());

    // Still the first connection
    assert!(matches!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Connected
    ));
    assert!(matches!(
        next_lifecycle(&mut events).await.unwrap(),
        ClientEvent::Ready { .. }
    ));
    client.shutdown().await;
}
