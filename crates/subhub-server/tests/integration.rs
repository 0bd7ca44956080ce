//! End-to-end tests over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use subhub_core::{IdentityId, IdentitySeed, Registry, RequestKind};
use subhub_server::{LatencyProfile, ServerConfig, SubhubServer};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn id(s: &str) -> IdentityId {
    IdentityId::from(s)
}

fn quiet_config() -> ServerConfig {
    ServerConfig {
        pulse_interval: Duration::from_secs(60),
        latency: LatencyProfile::none(),
        ..ServerConfig::default()
    }
}

async fn start(config: ServerConfig) -> (SubhubServer, SocketAddr) {
    let registry = Arc::new(Registry::new([
        IdentitySeed::new("user1", "User 1"),
        IdentitySeed::new("user2", "User 2"),
        IdentitySeed::new("user3", "User 3"),
    ]));
    let server = SubhubServer::new(config, registry);
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn connect_as(addr: SocketAddr, caller: &'static str) -> Ws {
    let mut req = format!("ws://{addr}/socket").into_client_request().unwrap();
    let _ = req
        .headers_mut()
        .insert("x-user-id", HeaderValue::from_static(caller));
    let (ws, _) = connect_async(req).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, text: &str) {
    ws.send(Message::text(text.to_owned())).await.unwrap();
}

async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next frame that is not a `Heartbeat`.
async fn next_reply(ws: &mut Ws) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame["type"] != "Heartbeat" {
            return frame;
        }
    }
}

async fn wait_for_connections(server: &SubhubServer, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while server.tracker().connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}

#[tokio::test]
async fn subscribe_after_delay_updates_registry() {
    let config = ServerConfig {
        latency: LatencyProfile {
            subscribe: Duration::from_millis(100),
            unsubscribe: Duration::ZERO,
        },
        ..quiet_config()
    };
    let (server, addr) = start(config).await;
    let mut ws = connect(addr).await;

    let started = std::time::Instant::now();
    send(&mut ws, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    let reply = next_reply(&mut ws).await;
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(reply["type"], "Subscribe");
    assert_eq!(reply["status"], "Subscribed");
    assert!(reply["updatedAt"].is_i64());
    assert_eq!(server.registry().subscribers_of(&id("user2")).unwrap(), vec![id("user1")]);
}

#[tokio::test]
async fn unsubscribe_when_not_subscribed() {
    let (server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"Unsubscribe","userId":"user2"}"#).await;
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["type"], "Unsubscribe");
    assert_eq!(reply["status"], "Unsubscribed");
    assert_eq!(server.registry().count_subscribers(&id("user2")), Ok(0));
}

#[tokio::test]
async fn count_with_no_subscribers_is_zero() {
    let (_server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"CountSubscribers","userId":"user1"}"#).await;
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["type"], "CountSubscribers");
    assert_eq!(reply["count"], 0);
}

#[tokio::test]
async fn bogus_request_keeps_connection_open() {
    let (_server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"Bogus"}"#).await;
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["error"], "Bad formatted payload");
    assert_eq!(reply["code"], "MALFORMED_REQUEST");

    send(&mut ws, r#"{"type":"CountSubscribers","userId":"user2"}"#).await;
    assert_eq!(next_reply(&mut ws).await["type"], "CountSubscribers");
}

#[tokio::test]
async fn error_frames_for_each_failure() {
    let (_server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;

    let cases = [
        ("not json at all", "MALFORMED_REQUEST"),
        (r#"{"type":"Subscribe"}"#, "MISSING_FIELD"),
        (r#"{"type":"Subscribe","userId":"user1"}"#, "SELF_SUBSCRIPTION"),
        (r#"{"type":"Subscribe","userId":"ghost"}"#, "UNKNOWN_IDENTITY"),
        (r#"{"type":"CountSubscribers","userId":"ghost"}"#, "UNKNOWN_IDENTITY"),
    ];
    for (text, code) in cases {
        send(&mut ws, text).await;
        let reply = next_reply(&mut ws).await;
        assert_eq!(reply["type"], "Error", "{text}");
        assert_eq!(reply["code"], code, "{text}");
    }
}

#[tokio::test]
async fn replies_follow_request_order() {
    let config = ServerConfig {
        latency: LatencyProfile {
            subscribe: Duration::from_millis(150),
            unsubscribe: Duration::from_millis(50),
        },
        ..quiet_config()
    };
    let (_server, addr) = start(config).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    send(&mut ws, r#"{"type":"CountSubscribers","userId":"user2"}"#).await;
    send(&mut ws, r#"{"type":"Unsubscribe","userId":"user2"}"#).await;
    send(&mut ws, r#"{"type":"CountSubscribers","userId":"user2"}"#).await;

    assert_eq!(next_reply(&mut ws).await["type"], "Subscribe");
    assert_eq!(next_reply(&mut ws).await["count"], 1);
    assert_eq!(next_reply(&mut ws).await["type"], "Unsubscribe");
    assert_eq!(next_reply(&mut ws).await["count"], 0);
}

#[tokio::test]
async fn pulses_arrive_every_interval() {
    let config = ServerConfig {
        pulse_interval: Duration::from_millis(100),
        ..quiet_config()
    };
    let (_server, addr) = start(config).await;
    let mut ws = connect(addr).await;

    let started = std::time::Instant::now();
    for _ in 0..3 {
        let frame = next_frame(&mut ws).await;
        assert_eq!(frame["type"], "Heartbeat");
        assert!(frame["updatedAt"].is_i64());
    }
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn caller_comes_from_identity_header() {
    let config = ServerConfig {
        identity_header: Some("x-user-id".into()),
        ..quiet_config()
    };
    let (server, addr) = start(config).await;
    let mut ws = connect_as(addr, "user3").await;

    send(&mut ws, r#"{"type":"Subscribe","userId":"user1"}"#).await;
    assert_eq!(next_reply(&mut ws).await["status"], "Subscribed");
    assert_eq!(server.registry().subscribers_of(&id("user1")).unwrap(), vec![id("user3")]);
}

#[tokio::test]
async fn subscriptions_are_shared_across_connections() {
    let config = ServerConfig {
        identity_header: Some("x-user-id".into()),
        ..quiet_config()
    };
    let (_server, addr) = start(config).await;
    let mut a = connect_as(addr, "user1").await;
    let mut b = connect_as(addr, "user3").await;

    send(&mut a, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    assert_eq!(next_reply(&mut a).await["type"], "Subscribe");
    send(&mut b, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    assert_eq!(next_reply(&mut b).await["type"], "Subscribe");

    send(&mut b, r#"{"type":"CountSubscribers","userId":"user2"}"#).await;
    assert_eq!(next_reply(&mut b).await["count"], 2);
}

#[tokio::test]
async fn closing_during_delay_discards_the_request() {
    let config = ServerConfig {
        latency: LatencyProfile {
            subscribe: Duration::from_millis(300),
            unsubscribe: Duration::ZERO,
        },
        ..quiet_config()
    };
    let (server, addr) = start(config).await;
    let mut ws = connect(addr).await;
    wait_for_connections(&server, 1).await;

    send(&mut ws, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    ws.close(None).await.unwrap();
    wait_for_connections(&server, 0).await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.registry().count_subscribers(&id("user2")), Ok(0));
}

#[tokio::test]
async fn disabled_action_is_unsupported() {
    let config = ServerConfig {
        actions: vec![RequestKind::CountSubscribers],
        ..quiet_config()
    };
    let (_server, addr) = start(config).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"Unsubscribe","userId":"user2"}"#).await;
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["code"], "UNSUPPORTED_ACTION");
    assert_eq!(reply["error"], "Requested method not implemented");
}

#[tokio::test]
async fn connections_over_limit_are_rejected() {
    let config = ServerConfig {
        max_connections: 1,
        ..quiet_config()
    };
    let (server, addr) = start(config).await;
    let _first = connect(addr).await;
    wait_for_connections(&server, 1).await;

    assert!(connect_async(format!("ws://{addr}/")).await.is_err());
}

#[tokio::test]
async fn concurrent_connects_respect_the_limit() {
    let config = ServerConfig {
        max_connections: 1,
        ..quiet_config()
    };
    let (server, addr) = start(config).await;

    let attempts = (0..8).map(|_| connect_async(format!("ws://{addr}/")));
    let accepted: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(accepted.len(), 1);
    wait_for_connections(&server, 1).await;

    drop(accepted);
    wait_for_connections(&server, 0).await;
    let reconnected = tokio::time::timeout(WAIT, async {
        loop {
            if let Ok((ws, _)) = connect_async(format!("ws://{addr}/")).await {
                return ws;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reconnected.is_ok());
}

#[tokio::test]
async fn undecodable_binary_frame_waits_for_pending_reply() {
    let config = ServerConfig {
        latency: LatencyProfile {
            subscribe: Duration::from_millis(300),
            unsubscribe: Duration::ZERO,
        },
        ..quiet_config()
    };
    let (_server, addr) = start(config).await;
    let mut ws = connect(addr).await;

    send(&mut ws, r#"{"type":"Subscribe","userId":"user2"}"#).await;
    ws.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();

    assert_eq!(next_reply(&mut ws).await["type"], "Subscribe");
    let err = next_reply(&mut ws).await;
    assert_eq!(err["type"], "Error");
    assert_eq!(err["code"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn utf8_binary_frames_are_handled_as_text() {
    let (_server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;

    let request = br#"{"type":"CountSubscribers","userId":"user2"}"#.to_vec();
    ws.send(Message::binary(request)).await.unwrap();
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["type"], "CountSubscribers");
    assert_eq!(reply["count"], 0);

    ws.send(Message::binary(vec![0xc3, 0x28])).await.unwrap();
    assert_eq!(next_reply(&mut ws).await["code"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn upgrade_on_health_path_opens_a_session() {
    let (server, addr) = start(quiet_config()).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/health")).await.unwrap();
    wait_for_connections(&server, 1).await;

    send(&mut ws, r#"{"type":"CountSubscribers","userId":"user1"}"#).await;
    assert_eq!(next_reply(&mut ws).await["type"], "CountSubscribers");
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let (server, addr) = start(quiet_config()).await;
    let mut ws = connect(addr).await;
    wait_for_connections(&server, 1).await;

    server.shutdown().shutdown();
    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    wait_for_connections(&server, 0).await;
}
