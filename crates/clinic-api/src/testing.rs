//! Mock remote API for tests
//!
//! Serves the auth endpoints plus a handful of resource routes on an
//! ephemeral port and counts hits so tests can assert exactly how many calls
//! a dispatch made.
//!
//! Tokens understood by the mock:
//! - access: only `at_valid` is accepted on protected routes
//! - refresh: `rt_valid`/`rt_next` yield a full pair, `rt_single` yields an
//!   access token only, `rt_empty` yields `{}`, anything else is a 401

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const VALID_EMAIL: &str = "admin@clinic.test";
pub const VALID_PASSWORD: &str = "correct-horse";
/// Sign-in succeeds with an empty body for this email.
pub const TOKENLESS_EMAIL: &str = "tokenless@clinic.test";

#[derive(Default)]
pub struct MockState {
    pub item_hits: AtomicUsize,
    pub refresh_hits: AtomicUsize,
    pub sign_in_hits: AtomicUsize,
    pub logout_hits: AtomicUsize,
    pub last_logout_bearer: Mutex<Option<String>>,
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockApi {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = axum::Router::new()
            .route("/auth/signin", post(sign_in))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/items", any(items))
            .route("/always-401", any(always_unauthorized))
            .route("/forbidden", get(forbidden))
            .route("/invalid", any(invalid))
            .route("/boom", get(boom))
            .route("/plain", get(plain))
            .route("/empty", any(empty))
            .route("/echo", any(echo))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn item_hits(&self) -> usize {
        self.state.item_hits.load(Ordering::SeqCst)
    }

    pub fn refresh_hits(&self) -> usize {
        self.state.refresh_hits.load(Ordering::SeqCst)
    }

    pub fn sign_in_hits(&self) -> usize {
        self.state.sign_in_hits.load(Ordering::SeqCst)
    }

    pub fn logout_hits(&self) -> usize {
        self.state.logout_hits.load(Ordering::SeqCst)
    }
}

/// Base URL where nothing listens.
pub async fn dead_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Unauthorized", "statusCode": 401})),
    )
        .into_response()
}

async fn sign_in(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.sign_in_hits.fetch_add(1, Ordering::SeqCst);
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match (email, password) {
        (VALID_EMAIL, VALID_PASSWORD) => {
            Json(json!({"access_token": "at_valid", "refresh_token": "rt_valid"})).into_response()
        }
        (TOKENLESS_EMAIL, _) => Json(json!({})).into_response(),
        ("broken@clinic.test", _) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
        }
        ("invalid", _) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": ["email must be an email"]})),
        )
            .into_response(),
        _ => unauthorized(),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.refresh_hits.fetch_add(1, Ordering::SeqCst);
    match bearer(&headers) {
        Some("rt_valid" | "rt_next") => {
            Json(json!({"access_token": "at_valid", "refresh_token": "rt_next"})).into_response()
        }
        Some("rt_single") => Json(json!({"access_token": "at_valid"})).into_response(),
        Some("rt_empty") => Json(json!({})).into_response(),
        _ => unauthorized(),
    }
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.logout_hits.fetch_add(1, Ordering::SeqCst);
    *state.last_logout_bearer.lock().unwrap() = bearer(&headers).map(str::to_string);
    match bearer(&headers) {
        Some("at_valid") => StatusCode::NO_CONTENT.into_response(),
        _ => unauthorized(),
    }
}

async fn items(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.item_hits.fetch_add(1, Ordering::SeqCst);
    match bearer(&headers) {
        Some("at_valid") => Json(json!([{"id": 1, "name": "first"}])).into_response(),
        _ => unauthorized(),
    }
}

async fn always_unauthorized(State(state): State<Arc<MockState>>) -> Response {
    state.item_hits.fetch_add(1, Ordering::SeqCst);
    unauthorized()
}

async fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"message": "nope"}))).into_response()
}

async fn invalid() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"message": ["A", "B"], "error": "Bad Request"})),
    )
        .into_response()
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "kaput").into_response()
}

async fn plain() -> Response {
    ([(CONTENT_TYPE, "text/plain")], "hello").into_response()
}

async fn empty() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Echo method, path, query, headers and body back as JSON.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            )
        })
        .collect();
    Json(json!({
        "method": method.to_string(),
        "path": uri.path(),
        "query": uri.query().unwrap_or_default(),
        "headers": headers,
        "body": body,
    }))
}
