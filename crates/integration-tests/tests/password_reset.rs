//! Password change and reset through the HTTP API.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use chatlink_integration_tests::{Harness, TEST_PASSWORD};

const PHONE: &str = "+15551230001";
const NEW_PASSWORD: &str = "a-brand-new-secret";

async fn reset_verified(h: &Harness) -> String {
    let (status, _) = h.request_reset_code(PHONE).await;
    assert_eq!(status, StatusCode::OK);

    let code = h.last_code(PHONE);
    let (status, _) = h.verify_reset_code(PHONE, &code).await;
    assert_eq!(status, StatusCode::OK);
    code
}

#[tokio::test]
async fn test_change_password() {
    let h = Harness::new();
    let token = h.signed_up(PHONE, "Ana").await;

    let (status, body) = h
        .post_auth(
            "/api/change_password",
            &token,
            json!({ "password_1": "wrong-old-password", "password_2": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);

    let (status, body) = h
        .post_auth(
            "/api/change_password",
            &token,
            json!({ "password_1": TEST_PASSWORD, "password_2": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);

    let (status, _) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_requires_token() {
    let h = Harness::new();
    let (status, _) = h
        .post(
            "/api/change_password",
            json!({ "password_1": TEST_PASSWORD, "password_2": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_for_unknown_phone() {
    let h = Harness::new();
    let (status, body) = h.request_reset_code(PHONE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);
    assert!(h.app.sms.sent().is_empty());
}

#[tokio::test]
async fn test_reset_text_greets_user() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;
    h.request_reset_code(PHONE).await;

    let (to, body) = h.app.sms.sent().pop().unwrap();
    assert_eq!(to, PHONE);
    assert!(body.starts_with("Hello Ana, your verification code is: "));
}

#[tokio::test]
async fn test_complete_reset_clears_record() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;
    let code = reset_verified(&h).await;

    let (status, body) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);

    let (status, body) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": "yet-another-secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);

    let (status, _) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_complete_reset_requires_verification() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;
    h.request_reset_code(PHONE).await;
    let code = h.last_code(PHONE);

    let (status, body) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_reset_rejects_weak_password() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;
    let code = reset_verified(&h).await;

    let (status, _) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The verified record survives a rejected attempt
    let (status, _) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_cap_is_ten() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;

    for _ in 0..10 {
        let (status, _) = h.request_reset_code(PHONE).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = h.request_reset_code(PHONE).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_reset_reactivates_account() {
    let h = Harness::new();
    let user = h.app.store.insert_user(PHONE, "Ana").await;
    h.app.store.set_active(user.id, false);

    let (status, _) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let code = reset_verified(&h).await;
    let (status, _) = h
        .post(
            "/api/forgot/reset",
            json!({ "phone": PHONE, "otp": code, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": NEW_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_code_cannot_reset() {
    let h = Harness::new();
    h.request_code(PHONE).await;
    let code = h.last_code(PHONE);

    let (status, body) = h.verify_reset_code(PHONE, &code).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}
