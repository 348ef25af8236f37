//! Registration and login through the HTTP API.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use chatlink_integration_tests::{Harness, TEST_PASSWORD};
use chatlink_server::testing::{RecordingSmsGateway, TestApp};

const PHONE: &str = "+15551230001";

#[tokio::test]
async fn test_request_then_verify_succeeds_once_wrong_code_fails() {
    let h = Harness::new();
    let (status, body) = h.request_code(PHONE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);

    let code = h.last_code(PHONE);
    let wrong = if code.starts_with('0') { "1" } else { "0" }.repeat(code.len());

    let (status, body) = h.verify_code(PHONE, &wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);

    let (status, body) = h.verify_code(PHONE, &code).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);
}

#[tokio::test]
async fn test_code_is_never_returned() {
    let h = Harness::new();
    let (_, body) = h.request_code(PHONE).await;
    let code = h.last_code(PHONE);
    assert!(!body.to_string().contains(&code));
}

#[tokio::test]
async fn test_verify_without_request_is_not_found() {
    let h = Harness::new();
    let (status, body) = h.verify_code(PHONE, "123456").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_eighth_request_is_rate_limited_per_phone() {
    let h = Harness::new();
    for _ in 0..7 {
        let (status, _) = h.request_code(PHONE).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = h.request_code(PHONE).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["status"], false);
    assert_eq!(h.app.sms.sent().len(), 7);

    // Another phone has its own counter
    let (status, _) = h.request_code("+15551230002").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_parallel_requests_at_cap_send_one_sms() {
    let sms = RecordingSmsGateway::with_delay(Duration::from_millis(20));
    let h = Harness::from_app(TestApp::with_sms(sms));
    for _ in 0..6 {
        let (status, _) = h.request_code(PHONE).await;
        assert_eq!(status, StatusCode::OK);
    }

    let ((first, _), (second, _)) = tokio::join!(h.request_code(PHONE), h.request_code(PHONE));
    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    assert_eq!(h.app.sms.sent().len(), 7);
}

#[tokio::test]
async fn test_request_for_registered_phone_conflicts() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;

    let (status, body) = h.request_code(PHONE).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_second_registration_conflicts() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;

    let (status, _) = h
        .post(
            "/api/register",
            json!({ "phone": PHONE, "password": TEST_PASSWORD, "name": "Ana" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_requires_verified_phone() {
    let h = Harness::new();
    h.request_code(PHONE).await;

    let (status, body) = h
        .post(
            "/api/register",
            json!({ "phone": PHONE, "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_invalid_phone_and_missing_fields() {
    let h = Harness::new();
    let (status, body) = h.request_code("12ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);

    let (status, body) = h.post("/api/validate_otp", json!({ "phone": PHONE })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["detail"].as_str().unwrap().contains("otp"));
}

#[tokio::test]
async fn test_sms_failure_is_bad_gateway() {
    let h = Harness::new();
    h.app.sms.fail_next();
    let (status, body) = h.request_code(PHONE).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], false);

    // Nothing was recorded, so the phone can still verify a fresh code
    h.request_code(PHONE).await;
    let code = h.last_code(PHONE);
    let (status, _) = h.verify_code(PHONE, &code).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_response_and_first_login() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;

    let (status, body) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert!(body["expiry"].as_str().is_some());
    assert_eq!(body["user_name"], "Ana");
    assert_eq!(body["user"]["phone"], PHONE);
    assert_eq!(body["user"]["first_login"], true);
    assert_eq!(body["user"]["role"], "standard");
    assert!(body["user"].get("password_hash").is_none());

    let token = h.login(PHONE).await;
    let (status, body) = h.call(Method::GET, "/api/user", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_login"], false);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;

    let (status, body) = h
        .post(
            "/api/login",
            json!({ "phone": PHONE, "password": "not-the-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn test_logout_revokes_only_that_token() {
    let h = Harness::new();
    h.register(PHONE, "Ana").await;
    let first = h.login(PHONE).await;
    let second = h.login(PHONE).await;

    let (status, _) = h.call(Method::POST, "/api/logout", None, Some(&first)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = h.call(Method::GET, "/api/user", None, Some(&first)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = h.call(Method::GET, "/api/user", None, Some(&second)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .call(Method::POST, "/api/logoutall", None, Some(&second))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = h.call(Method::GET, "/api/user", None, Some(&second)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.app.store.token_count(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/api/user", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);

    let (status, _) = h
        .call(Method::GET, "/api/user", None, Some("forged-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_endpoints() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, _) = h.call(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
