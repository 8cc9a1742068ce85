//! Integration tests for the chat REST API and the events it publishes.

mod common;

use serde_json::{json, Value};
use std::time::Duration;

use common::*;

async fn get_json(server: &TestServer, caller: &str, path: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .get(format!("{}{}", server.base_url, path))
        .bearer_auth(server.token(caller))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

async fn delete(server: &TestServer, caller: &str, path: &str) -> u16 {
    reqwest::Client::new()
        .delete(format!("{}{}", server.base_url, path))
        .bearer_auth(server.token(caller))
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_health_is_public() {
    let server = start_test_server().await;
    let body = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let server = start_test_server().await;
    let resp = reqwest::get(format!("{}/api/chats", server.base_url)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_create_chat_is_find_or_create() {
    let server = start_test_server().await;
    let mut u1 = connect(&server, "u1").await;
    let mut u2 = connect(&server, "u2").await;

    let (status, chat) = create_chat(&server, "u1", "u2").await;
    assert_eq!(status, 201);
    assert_eq!(chat["senderId"], "u1");
    assert_eq!(chat["recipientId"], "u2");

    // Both participants hear about the new chat
    for ws in [&mut u1, &mut u2] {
        let event = expect_event(ws, "chat-created").await;
        assert_eq!(event["data"]["chat"]["id"], chat["id"]);
    }

    // Same pair from the other side returns the existing row, no new event
    let (status, again) = create_chat(&server, "u2", "u1").await;
    assert_eq!(status, 200);
    assert_eq!(again["id"], chat["id"]);
    assert!(next_event_within(&mut u2, Duration::from_millis(300)).await.is_none());

    let (status, _) = create_chat(&server, "u1", "u1").await;
    assert_eq!(status, 400);

    let (_, listed) = get_json(&server, "u2", "/api/chats").await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_chat_access_is_limited_to_participants() {
    let server = start_test_server().await;
    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let chat_id = chat["id"].as_str().unwrap();

    let (status, _) = get_json(&server, "u1", &format!("/api/chats/{}", chat_id)).await;
    assert_eq!(status, 200);
    let (status, _) = get_json(&server, "u3", &format!("/api/chats/{}", chat_id)).await;
    assert_eq!(status, 403);
    let (status, _) = get_json(&server, "u1", "/api/chats/missing").await;
    assert_eq!(status, 404);
    let (status, _) = get_json(&server, "u3", &format!("/api/messages/{}", chat_id)).await;
    assert_eq!(status, 403);
}

/// u1 and u2 share c1; u1 is viewing c1 when u2 reads the conversation.
#[tokio::test]
async fn test_message_seen_scenario() {
    let server = start_test_server().await;
    let mut u1 = connect(&server, "u1").await;
    let mut u2 = connect(&server, "u2").await;

    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let c1 = chat["id"].as_str().unwrap().to_string();

    send_json(&mut u1, json!({"event": "join_chat", "data": c1})).await;
    sync(&mut u1).await;

    let sent = send_message(&server, "u1", &c1, "hi").await;
    assert_eq!(sent["isRead"], false);

    // New message lands in u2's personal room
    let event = expect_event(&mut u2, "messages").await;
    assert_eq!(event["data"]["action"], "new");
    assert_eq!(event["data"]["message"]["id"], sent["id"]);
    assert_eq!(event["data"]["message"]["text"], "hi");

    send_json(
        &mut u2,
        json!({"event": "messages-seen", "data": {"conversationId": c1}}),
    )
    .await;

    let seen = expect_event(&mut u1, "messages-seen").await;
    assert_eq!(seen["data"], json!({"conversationId": c1, "userId": "u2"}));

    let (status, history) = get_json(&server, "u1", &format!("/api/messages/{}", c1)).await;
    assert_eq!(status, 200);
    assert_eq!(history[0]["id"], sent["id"]);
    assert_eq!(history[0]["isRead"], true);
}

#[tokio::test]
async fn test_seen_does_not_mark_own_messages() {
    let server = start_test_server().await;
    let mut u1 = connect(&server, "u1").await;

    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let c1 = chat["id"].as_str().unwrap().to_string();
    send_message(&server, "u1", &c1, "from u1").await;
    send_message(&server, "u2", &c1, "from u2").await;

    send_json(&mut u1, json!({"event": "messages-seen", "data": {"chatId": c1}})).await;
    sync(&mut u1).await;

    let (_, history) = get_json(&server, "u1", &format!("/api/messages/{}", c1)).await;
    assert_eq!(history[0]["text"], "from u1");
    assert_eq!(history[0]["isRead"], false);
    assert_eq!(history[1]["text"], "from u2");
    assert_eq!(history[1]["isRead"], true);
}

#[tokio::test]
async fn test_only_sender_deletes_message() {
    let server = start_test_server().await;
    let mut u2 = connect(&server, "u2").await;

    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let c1 = chat["id"].as_str().unwrap().to_string();
    send_json(&mut u2, json!({"event": "join_chat", "data": c1})).await;
    sync(&mut u2).await;

    let sent = send_message(&server, "u1", &c1, "oops").await;
    let message_id = sent["id"].as_str().unwrap();

    assert_eq!(delete(&server, "u2", &format!("/api/messages/{}", message_id)).await, 403);
    assert_eq!(delete(&server, "u1", &format!("/api/messages/{}", message_id)).await, 204);
    assert_eq!(delete(&server, "u1", &format!("/api/messages/{}", message_id)).await, 404);

    let event = loop {
        let event = expect_event(&mut u2, "messages").await;
        if event["data"]["action"] == "delete" {
            break event;
        }
    };
    assert_eq!(event["data"]["messageId"], sent["id"]);
    assert_eq!(event["data"]["conversationId"], c1);
}

#[tokio::test]
async fn test_chat_delete_reaches_each_connection_once() {
    let server = start_test_server().await;
    let mut u1 = connect(&server, "u1").await;
    let mut u2 = connect(&server, "u2").await;

    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let c1 = chat["id"].as_str().unwrap().to_string();
    send_message(&server, "u1", &c1, "bye").await;

    // u2 is in both its personal room and the conversation room
    send_json(&mut u2, json!({"event": "join_chat", "data": c1})).await;
    sync(&mut u2).await;

    assert_eq!(delete(&server, "u1", &format!("/api/chats/{}", c1)).await, 204);

    for ws in [&mut u1, &mut u2] {
        let event = expect_event(ws, "chat-deleted").await;
        assert_eq!(event["data"]["conversationId"], c1);
        let duplicate = next_event_within(ws, Duration::from_millis(300)).await;
        assert!(duplicate.map_or(true, |e| e["event"] != "chat-deleted"));
    }

    let (status, _) = get_json(&server, "u1", &format!("/api/chats/{}", c1)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_presence_endpoints() {
    let server = start_test_server().await;
    let _u1 = connect(&server, "u1").await;

    let (status, online) = get_json(&server, "u2", "/api/presence").await;
    assert_eq!(status, 200);
    assert_eq!(online, json!(["u1"]));

    let (_, status_u1) = get_json(&server, "u2", "/api/presence/u1").await;
    assert_eq!(status_u1, json!({"userId": "u1", "online": true}));
    let (_, status_u3) = get_json(&server, "u2", "/api/presence/u3").await;
    assert_eq!(status_u3["online"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_sends_are_delivered_in_commit_order() {
    const SENDS: usize = 40;

    let server = std::sync::Arc::new(start_test_server().await);
    let mut u2 = connect(&server, "u2").await;
    let (_, chat) = create_chat(&server, "u1", "u2").await;
    let c1 = chat["id"].as_str().unwrap().to_string();

    let handles: Vec<_> = (0..SENDS)
        .map(|i| {
            let server = server.clone();
            let c1 = c1.clone();
            tokio::spawn(async move {
                send_message(&server, "u1", &c1, &format!("burst {}", i)).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut delivered = Vec::with_capacity(SENDS);
    while delivered.len() < SENDS {
        let event = expect_event(&mut u2, "messages").await;
        if event["data"]["action"] == "new" {
            delivered.push(event["data"]["message"]["id"].clone());
        }
    }

    let (_, history) = get_json(&server, "u1", &format!("/api/messages/{}", c1)).await;
    let committed: Vec<Value> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].clone())
        .collect();
    assert_eq!(delivered, committed);
}
