//! Chat requests through the HTTP API.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use chatlink_integration_tests::Harness;

const ALICE: &str = "+15551230001";
const BOB: &str = "+15551230002";
const CAROL: &str = "+15551230003";

struct Users {
    alice: String,
    bob: String,
    carol: String,
}

async fn setup(h: &Harness) -> Users {
    Users {
        alice: h.signed_up(ALICE, "Alice").await,
        bob: h.signed_up(BOB, "Bob").await,
        carol: h.signed_up(CAROL, "Carol").await,
    }
}

async fn create_chat(h: &Harness, token: &str, to: &str) -> Value {
    let (status, body) = h
        .post_auth("/api/chat/create", token, json!({ "phone_hasta": to }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_create_chat_response() {
    let h = Harness::new();
    let users = setup(&h).await;

    let body = create_chat(&h, &users.alice, BOB).await;
    assert_eq!(body["status"], true);
    assert!(body["id_conversacion"].as_i64().is_some());
    assert!(body["id_destinatario"].as_i64().is_some());
    assert_eq!(body["nombre_destinatario"], "Bob");
}

#[tokio::test]
async fn test_create_chat_unknown_recipient() {
    let h = Harness::new();
    let users = setup(&h).await;

    let (status, body) = h
        .post_auth(
            "/api/chat/create",
            &users.alice,
            json!({ "phone_hasta": "+15559990000" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_validate_only_for_recipient() {
    let h = Harness::new();
    let users = setup(&h).await;
    let id = create_chat(&h, &users.alice, BOB).await["id_conversacion"].clone();

    let (status, body) = h
        .post_auth("/api/chat/validate", &users.bob, json!({ "id_chat": id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);

    for other in [&users.alice, &users.carol] {
        let (status, body) = h
            .post_auth("/api/chat/validate", other, json!({ "id_chat": id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], false);
    }
}

#[tokio::test]
async fn test_authorize_and_approval() {
    let h = Harness::new();
    let users = setup(&h).await;
    let id = create_chat(&h, &users.alice, BOB).await["id_conversacion"].clone();

    // Non-recipient cannot accept
    let (status, body) = h
        .post_auth("/api/chat/authorize", &users.carol, json!({ "id_chat": id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], false);

    let (_, body) = h
        .post_auth("/api/chat/approval", &users.alice, json!({ "id_chat": id }))
        .await;
    assert_eq!(body["status"], false);

    // Recipient accepts, twice
    for _ in 0..2 {
        let (status, body) = h
            .post_auth("/api/chat/authorize", &users.bob, json!({ "id_chat": id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], true);
    }

    let (_, body) = h
        .post_auth("/api/chat/approval", &users.alice, json!({ "id_chat": id }))
        .await;
    assert_eq!(body["status"], true);

    // Only the initiator learns the answer
    let (_, body) = h
        .post_auth("/api/chat/approval", &users.bob, json!({ "id_chat": id }))
        .await;
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_unknown_chat_is_not_found() {
    let h = Harness::new();
    let users = setup(&h).await;

    for path in ["/api/chat/validate", "/api/chat/authorize", "/api/chat/approval"] {
        let (status, body) = h
            .post_auth(path, &users.bob, json!({ "id_chat": 424_242 }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body["status"], false);
    }
}

#[tokio::test]
async fn test_chat_requires_token() {
    let h = Harness::new();
    let (status, _) = h
        .post("/api/chat/create", json!({ "phone_hasta": BOB }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_chat_id() {
    let h = Harness::new();
    let users = setup(&h).await;
    let (status, body) = h
        .post_auth(
            "/api/chat/validate",
            &users.bob,
            json!({ "id_chat": "not-a-number" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}
