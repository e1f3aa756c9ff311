//! Router fixtures for handler tests.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use brandlens_core::{AppConfig, Environment};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use super::{build_app, default_rate_limit_state, AppState};
use crate::middleware::AuthState;

/// Configuration with no upstream credentials: searches degrade without a call.
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        env: Environment::Test,
        bind_addr: "127.0.0.1:0".parse().unwrap_or_else(|e| panic!("addr: {e}")),
        log_level: "debug".to_string(),
        app_url: "http://localhost:3000".to_string(),
        supabase_jwt_secret: None,
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        openai_api_key: None,
        openai_base_url: "http://127.0.0.1:9".to_string(),
        search_model: "gpt-4o-mini".to_string(),
        search_timeout_secs: 2,
        search_max_retries: 0,
        search_backoff_base_secs: 0,
        contact_timeout_secs: 2,
        contact_user_agent: "BrandLens-Test/1.0".to_string(),
        contact_delay_ms: 0,
        webhook_timeout_secs: 2,
        tracker_poll_cron: "0 */5 * * * *".to_string(),
        tracker_poll_delay_ms: 0,
        stripe_secret_key: None,
        stripe_webhook_secret: None,
        stripe_base_url: "http://127.0.0.1:9".to_string(),
        stripe_price_pro: None,
        stripe_price_business: None,
    }
}

pub(crate) fn state_with_config(pool: PgPool, config: AppConfig) -> AppState {
    AppState::from_config(pool, Arc::new(config))
        .unwrap_or_else(|e| panic!("failed to build test state: {e}"))
}

pub(crate) fn test_state(pool: PgPool) -> AppState {
    state_with_config(pool, test_config())
}

/// App running every request as the development user.
pub(crate) fn test_app(pool: PgPool) -> Router {
    build_app(
        test_state(pool),
        AuthState::development(),
        default_rate_limit_state(),
    )
}

async fn read(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(request)
        .await
        .unwrap_or_else(|e| panic!("request failed: {e}"));
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|e| panic!("body bytes: {e}"));
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("json parse: {e}"))
    };
    (status, body)
}

pub(crate) async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("request: {e}"));
    read(app, request).await
}

pub(crate) async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: &Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|e| panic!("request: {e}"));
    read(app, request).await
}

pub(crate) async fn send_empty(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("request: {e}"));
    read(app, request).await
}

/// POSTs `body` verbatim with extra headers; signed webhook payloads need the exact bytes.
pub(crate) async fn post_raw(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: String,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(Body::from(body))
        .unwrap_or_else(|e| panic!("request: {e}"));
    read(app, request).await
}

/// Seeds a profile on `plan` for `user_id`.
pub(crate) async fn seed_profile(pool: &PgPool, user_id: uuid::Uuid, email: &str, plan: &str) {
    sqlx::query("INSERT INTO profiles (user_id, email, plan) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(email)
        .bind(plan)
        .execute(pool)
        .await
        .unwrap_or_else(|e| panic!("seed profile: {e}"));
}
