//! Shared helpers for integration tests: a server on a random port plus a
//! small JSON WebSocket client.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use murmur_server::config::{RateLimitConfig, RealtimeConfig};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub secret: Vec<u8>,
}

impl TestServer {
    pub fn token(&self, user_id: &str) -> String {
        murmur_server::auth::jwt::issue_access_token(&self.secret, user_id, 3600)
            .expect("Failed to issue token")
    }

    pub fn ws_url_for(&self, user_id: &str) -> String {
        format!("{}?token={}", self.ws_url, self.token(user_id))
    }
}

/// Start the server on a random port with default keepalive settings.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(RealtimeConfig::default()).await
}

/// Start the server on a random port backed by a fresh SQLite file.
pub async fn start_test_server_with(realtime_config: RealtimeConfig) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = murmur_server::db::init_db(&data_dir).expect("Failed to init DB");
    let secret = murmur_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state =
        murmur_server::state::AppState::with_sqlite(db, secret.clone(), realtime_config);
    let app = murmur_server::routes::build_router(state, &RateLimitConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        ws_url: format!("ws://{}/ws", addr),
        secret,
    }
}

/// Connect as `user_id` and wait until the server has announced this
/// identity as online, which means admission is complete.
pub async fn connect(server: &TestServer, user_id: &str) -> WsStream {
    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url_for(user_id))
        .await
        .expect("WebSocket connect failed");

    loop {
        let event = next_event(&mut ws).await.expect("No presence broadcast after connect");
        if event["event"] == "online_users"
            && event["data"]
                .as_array()
                .is_some_and(|ids| ids.iter().any(|id| id == user_id))
        {
            break;
        }
    }
    ws
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    send_text(ws, &value.to_string()).await;
}

pub async fn send_text(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Next JSON event within two seconds, skipping control frames.
pub async fn next_event(ws: &mut WsStream) -> Option<Value> {
    next_event_within(ws, Duration::from_secs(2)).await
}

pub async fn next_event_within(ws: &mut WsStream, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(text.as_str()).ok();
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => return None,
            Ok(Some(Ok(_))) => continue,
            Err(_) => return None,
        }
    }
}

/// Read events until one named `name` arrives.
pub async fn expect_event(ws: &mut WsStream, name: &str) -> Value {
    loop {
        match next_event(ws).await {
            Some(event) if event["event"] == name => return event,
            Some(_) => continue,
            None => panic!("Expected a '{}' event", name),
        }
    }
}

/// Round-trip an `is_online` query. Intents are handled in order, so once
/// the answer arrives every earlier intent from this socket has been applied.
pub async fn sync(ws: &mut WsStream) {
    send_json(
        ws,
        serde_json::json!({"event": "is_online", "data": {"userId": "nobody"}}),
    )
    .await;
    expect_event(ws, "is_online").await;
}

/// Create (or fetch) the conversation between `caller` and `recipient`.
pub async fn create_chat(server: &TestServer, caller: &str, recipient: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chats", server.base_url))
        .bearer_auth(server.token(caller))
        .json(&serde_json::json!({ "recipientId": recipient }))
        .send()
        .await
        .expect("create chat request failed");
    let status = resp.status().as_u16();
    (status, resp.json().await.expect("create chat body"))
}

pub async fn send_message(server: &TestServer, caller: &str, chat_id: &str, text: &str) -> Value {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/messages/{}", server.base_url, chat_id))
        .bearer_auth(server.token(caller))
        .json(&serde_json::json!({ "messageText": text }))
        .send()
        .await
        .expect("send message request failed");
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.expect("send message body")
}
