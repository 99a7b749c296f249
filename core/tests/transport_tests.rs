/// Transport tests
/// Loopback socket server exercising handshake, push delivery, acks and
/// reconnect

extern crate marketsync_core;

use futures_util::{SinkExt, StreamExt};
use marketsync_core::ack::AckSink;
use marketsync_core::model::Notification;
use marketsync_core::transport::{AckFrame, ChannelEvent, TransportChannel};
use marketsync_core::Config;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(events: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream ended")
}

async fn accept_client(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<tokio::net::TcpStream>) -> String {
    let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    frame.to_text().unwrap().to_string()
}

fn data_frame(id: i64) -> String {
    let inner = json!({
        "notif_type": "NEW_MESSAGE",
        "notification": {
            "id": 900,
            "message": "are you still selling it?",
            "sender": {"id": 2, "display_name": "Bea"},
            "offer": {"id": 12},
        }
    });
    json!({"id": id, "value": inner.to_string()}).to_string()
}

#[tokio::test]
async fn test_handshake_push_ack_and_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        base_url: format!("http://{}", addr),
        auth_token: "session-token-1".to_string(),
        reconnect_delay: Duration::from_millis(50),
        ..Default::default()
    };

    let (mut handle, mut events) = TransportChannel::connect(&config);
    assert!(handle.is_streaming());

    let mut ws = accept_client(&listener).await;
    assert_eq!(next_text(&mut ws).await, "session-token-1");
    assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);

    // Control frames are only logged
    ws.send(WsMessage::Text("-IWelcome".into())).await.unwrap();
    ws.send(WsMessage::Text(data_frame(7).into())).await.unwrap();
    match next_event(&mut events).await {
        ChannelEvent::Notification(event) => {
            assert_eq!(event.id, 7);
            match event.notification {
                Notification::NewMessage(message) => {
                    assert_eq!(message.conversation_id, 12);
                    assert_eq!(message.sender.id, 2);
                }
                other => panic!("unexpected notification {:?}", other),
            }
        }
        other => panic!("unexpected event {:?}", other),
    }

    handle.send_ack(AckFrame::Read(7));
    assert_eq!(next_text(&mut ws).await, "-r7");
    handle.send_ack(AckFrame::ReadUpTo(7));
    assert_eq!(next_text(&mut ws).await, "-R7");

    ws.close(None).await.unwrap();
    drop(ws);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Lost {
            retry_in: Duration::from_millis(50)
        }
    );

    // Fresh handshake on the new connection
    let mut ws = accept_client(&listener).await;
    assert_eq!(next_text(&mut ws).await, "session-token-1");
    assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        base_url: format!("http://{}", addr),
        auth_token: "t".to_string(),
        ..Default::default()
    };
    let (_handle, mut events) = TransportChannel::connect(&config);

    let mut ws = accept_client(&listener).await;
    next_text(&mut ws).await;
    assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);

    ws.send(WsMessage::Text("{not json".into())).await.unwrap();
    let unknown = json!({"id": 3, "value": "{\"notif_type\":\"NOTIF_SOMETHING\",\"notification\":{}}"});
    ws.send(WsMessage::Text(unknown.to_string().into())).await.unwrap();
    ws.send(WsMessage::Text(data_frame(4).into())).await.unwrap();

    match next_event(&mut events).await {
        ChannelEvent::Notification(event) => assert_eq!(event.id, 4),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_push_disabled_is_snapshot_only() {
    let config = Config {
        push_enabled: false,
        ..Default::default()
    };
    let (mut handle, mut events) = TransportChannel::connect(&config);
    assert!(!handle.is_streaming());
    handle.send_ack(AckFrame::ReadUpTo(1));
    assert_eq!(next_event(&mut events).await, ChannelEvent::Unsupported);
    assert!(events.recv().await.is_none());
}
