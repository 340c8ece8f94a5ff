// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use lingo_ledger::config::Config;
use lingo_ledger::db::Db;
use lingo_ledger::models::{Role, User};
use lingo_ledger::routes::create_router;
use lingo_ledger::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// API key accepted by `Config::test_default()`.
#[allow(dead_code)]
pub const TEST_API_KEY: &str = "test-internal-key";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    Db::firestore("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over an empty in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, Db::in_memory()));
    (create_router(state.clone()), state)
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    lingo_ledger::middleware::auth::create_jwt(user_id, signing_key, 1)
        .expect("Failed to create JWT")
}

/// Store a user directly and return it with a session token.
#[allow(dead_code)]
pub async fn provision_user(state: &AppState, name: &str, roles: &[Role]) -> (User, String) {
    let user = User {
        id: format!("user-{}", name),
        email: format!("{}@example.com", name),
        display_name: name.to_string(),
        roles: roles.to_vec(),
        created_at: "2025-01-01T00:00:00.000Z".to_string(),
    };
    state.db.upsert_user(&user).await.expect("store user");
    let token = create_test_jwt(&user.id, &state.config.jwt_signing_key);
    (user, token)
}

/// Send a request and decode the JSON response (Null for empty bodies).
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Convenience wrappers.
#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

#[allow(dead_code)]
pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

/// POST to an `/internal` route with the test API key.
#[allow(dead_code)]
pub async fn post_internal(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(TEST_API_KEY), Some(body)).await
}
