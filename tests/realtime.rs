mod common;

use futures_util::SinkExt;
use reqwest::StatusCode;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use common::{json_body, next_event, rejected_status, spawn_app, Socket};

async fn send(socket: &mut Socket, frame: serde_json::Value) {
    socket
        .send(Message::Text(frame.to_string()))
        .await
        .expect("send frame");
}

#[tokio::test]
async fn test_gateway_rejects_bad_tokens() {
    let app = spawn_app().await;

    let err = app.connect_ws("not-a-jwt").await.err().expect("rejected");
    assert_eq!(rejected_status(err), 401);

    let err = tokio_tungstenite::connect_async(format!("{}/ws", app.base.replacen("http", "ws", 1)))
        .await
        .err()
        .expect("rejected");
    assert_eq!(rejected_status(err), 401);

    // a logged-out token stays refused
    let alice = app.verified_user("alice").await;
    assert_eq!(app.post("/api/auth/logout", &alice.token, json!({})).await.status(), StatusCode::OK);
    let err = app.connect_ws(&alice.token).await.err().expect("rejected");
    assert_eq!(rejected_status(err), 401);
}

#[tokio::test]
async fn test_http_message_reaches_receiver_socket() {
    let app = spawn_app().await;
    let (alice, bob) = app.connected_pair("alice", "bob").await;

    let mut bob_ws = app.connect_ws(&bob.token).await.expect("connect");
    let frame = next_event(&mut bob_ws).await;
    assert_eq!(frame["event"], "connected");
    assert_eq!(frame["data"]["user_id"], bob.id);

    let res = app
        .post(&format!("/api/chat/messages/{}", bob.id), &alice.token, json!({"content": "hi bob"}))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let frame = next_event(&mut bob_ws).await;
    assert_eq!(frame["event"], "new_message");
    assert_eq!(frame["data"]["sender_id"], alice.id);
    assert_eq!(frame["data"]["content"], "hi bob");

    let frame = next_event(&mut bob_ws).await;
    assert_eq!(frame["event"], "notification");
    assert_eq!(frame["data"]["type"], "message");
    assert_eq!(frame["data"]["from_user_id"], alice.id);
}

#[tokio::test]
async fn test_socket_send_message_and_typing() {
    let app = spawn_app().await;
    let (alice, bob) = app.connected_pair("alice", "bob").await;
    let carol = app.verified_user("carol").await;

    let mut alice_ws = app.connect_ws(&alice.token).await.expect("connect");
    assert_eq!(next_event(&mut alice_ws).await["event"], "connected");
    let mut bob_ws = app.connect_ws(&bob.token).await.expect("connect");
    assert_eq!(next_event(&mut bob_ws).await["event"], "connected");

    send(
        &mut bob_ws,
        json!({"event": "send_message", "data": {"receiver_id": alice.id, "content": "  over ws  "}}),
    )
    .await;
    let frame = next_event(&mut bob_ws).await;
    assert_eq!(frame["event"], "message_sent");
    assert_eq!(frame["data"]["content"], "over ws");

    let frame = next_event(&mut alice_ws).await;
    assert_eq!(frame["event"], "new_message");
    assert_eq!(frame["data"]["sender_id"], bob.id);
    assert_eq!(next_event(&mut alice_ws).await["event"], "notification");

    send(&mut bob_ws, json!({"event": "typing", "data": {"receiver_id": alice.id, "is_typing": true}})).await;
    let frame = next_event(&mut alice_ws).await;
    assert_eq!(frame["event"], "user_typing");
    assert_eq!(frame["data"], json!({"user_id": bob.id, "is_typing": true}));

    // the message went through the same store as HTTP
    let history = json_body(app.get(&format!("/api/chat/messages/{}", bob.id), &alice.token).await).await;
    assert!(history.to_string().contains("over ws"));

    let mut carol_ws = app.connect_ws(&carol.token).await.expect("connect");
    assert_eq!(next_event(&mut carol_ws).await["event"], "connected");

    send(
        &mut carol_ws,
        json!({"event": "send_message", "data": {"receiver_id": alice.id, "content": "hello?"}}),
    )
    .await;
    assert_eq!(next_event(&mut carol_ws).await["event"], "error");

    send(&mut carol_ws, json!({"event": "dance"})).await;
    let frame = next_event(&mut carol_ws).await;
    assert_eq!(frame["event"], "error");
    assert_eq!(frame["data"]["message"], "Unknown or malformed event");
}
