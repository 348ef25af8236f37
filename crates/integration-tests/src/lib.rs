//! Integration tests for chatlink.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests against in-memory stores
//! cargo test -p chatlink-integration-tests
//!
//! # Live tests against a running server (SMS_PROVIDER=log)
//! CHATLINK_BASE_URL=http://localhost:8000 cargo test -p chatlink-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `registration` - Code issuance, verification, account creation, login
//! - `password_reset` - Password change and the reset flow
//! - `chat` - Chat requests between users
//! - `live_server` - End-to-end checks over HTTP (ignored by default)

#![allow(clippy::missing_panics_doc, clippy::expect_used, clippy::unwrap_used)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use chatlink_server::routes;
use chatlink_server::testing::TestApp;

pub use chatlink_server::testing::TEST_PASSWORD;

/// An in-process API over in-memory stores.
pub struct Harness {
    pub app: TestApp,
    router: Router,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::from_app(TestApp::new())
    }

    #[must_use]
    pub fn from_app(app: TestApp) -> Self {
        let router = routes::app(app.state.clone());
        Self { app, router }
    }

    /// Send a request and decode the JSON response (`Value::Null` when empty).
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, Some(body), None).await
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, Some(body), Some(token)).await
    }

    /// Ask for a registration code.
    pub async fn request_code(&self, phone: &str) -> (StatusCode, Value) {
        let body = json!({ "phone": phone });
        self.post("/api/validate_phone", body).await
    }

    /// Confirm a registration code.
    pub async fn verify_code(&self, phone: &str, otp: &str) -> (StatusCode, Value) {
        let body = json!({ "phone": phone, "otp": otp });
        self.post("/api/validate_otp", body).await
    }

    /// Ask for a password reset code.
    pub async fn request_reset_code(&self, phone: &str) -> (StatusCode, Value) {
        let body = json!({ "phone": phone });
        self.post("/api/forgot/validate_phone", body).await
    }

    /// Confirm a password reset code.
    pub async fn verify_reset_code(&self, phone: &str, otp: &str) -> (StatusCode, Value) {
        let body = json!({ "phone": phone, "otp": otp });
        self.post("/api/forgot/validate_otp", body).await
    }

    /// The last code texted to `phone`.
    #[must_use]
    pub fn last_code(&self, phone: &str) -> String {
        self.app
            .sms
            .last_code_for(phone)
            .expect("a code should have been sent")
    }

    /// Run the full registration flow for `phone`.
    pub async fn register(&self, phone: &str, name: &str) {
        let (status, _) = self.request_code(phone).await;
        assert_eq!(status, StatusCode::OK);

        let otp = self.last_code(phone);
        let (status, _) = self.verify_code(phone, &otp).await;
        assert_eq!(status, StatusCode::OK);

        let body = json!({ "phone": phone, "password": TEST_PASSWORD, "name": name });
        let (status, body) = self.post("/api/register", body).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    /// Log in with [`TEST_PASSWORD`] and return the token.
    pub async fn login(&self, phone: &str) -> String {
        let body = json!({ "phone": phone, "password": TEST_PASSWORD });
        let (status, body) = self.post("/api/login", body).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Register and log in.
    pub async fn signed_up(&self, phone: &str, name: &str) -> String {
        self.register(phone, name).await;
        self.login(phone).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
