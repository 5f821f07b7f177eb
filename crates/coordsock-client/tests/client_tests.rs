//! Client Tests
//!
//! Client behaviour against a live relay: connect, send, receive, close.

use coordsock_client::{Client, ClientError};
use coordsock_core::{Inbound, Message};
use coordsock_test_utils::{expect_error, expect_inbound, find_available_port, TestRelay};
use coordsock_transport::TransportError;
use std::time::Duration;

#[tokio::test]
async fn test_connect_registers_identifier() {
    let relay = TestRelay::start().await;

    let client = Client::builder(&relay.url()).id("pen").connect().await.unwrap();

    assert_eq!(client.id(), "pen");
    assert!(client.is_connected());
    assert!(relay.wait_registered("pen").await);
}

#[tokio::test]
async fn test_connect_refused() {
    let port = find_available_port().await;

    let result = Client::connect(&format!("ws://127.0.0.1:{}", port), "A").await;

    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::ConnectionFailed(_)))
    ));
}

#[tokio::test]
async fn test_send_and_receive() {
    let relay = TestRelay::start().await;
    let a = relay.connect("A").await;
    let b = relay.connect("B").await;

    let msg = Message::new("A", "B")
        .with_position(42.0, 7.5)
        .with_gesture("long_press");
    a.send(&msg).await.unwrap();

    match expect_inbound(&b).await {
        Inbound::Message(received) => {
            assert_eq!(received.from, "A");
            assert_eq!(received.gestval, "long_press");
            assert_eq!((received.xval, received.yval), (42.0, 7.5));
        }
        other => panic!("expected a message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_notifications_are_decoded() {
    let relay = TestRelay::start().await;
    let a = relay.connect("A").await;

    a.send(&Message::new("A", "nobody").with_position(1.0, 1.0).with_gesture("tap"))
        .await
        .unwrap();

    assert_eq!(expect_error(&a).await, "Target client nobody does not exist");
}

#[tokio::test]
async fn test_recv_timeout() {
    let relay = TestRelay::start().await;
    let a = relay.connect("A").await;

    let result = a.recv_timeout(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(ClientError::Timeout)));
}

#[tokio::test]
async fn test_send_after_close() {
    let relay = TestRelay::start().await;
    let a = relay.connect("A").await;

    a.close().await;

    assert!(!a.is_connected());
    assert!(matches!(
        a.send_raw("{}").await,
        Err(ClientError::NotConnected)
    ));
    assert!(relay.wait_unregistered("A").await);
}

#[tokio::test]
async fn test_send_after_relay_drops_connection() {
    let relay = TestRelay::start().await;
    let a = relay.connect("A").await;

    relay.router().stop();
    while a.recv().await.is_some() {}

    let result = a.send_raw("{}").await;
    assert!(
        matches!(
            result,
            Err(ClientError::NotConnected) | Err(ClientError::Transport(_))
        ),
        "{:?}",
        result
    );
}
