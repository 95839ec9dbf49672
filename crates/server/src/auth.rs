//! Inbound authentication.
//!
//! Two distinct concerns share this module:
//! - **Gateway auth**: is the caller allowed to use this proxy at all? Governed
//!   by `PROXY_API_KEY`; disabled entirely when unset.
//! - **Client key extraction**: the same `x-api-key`/`Authorization: Bearer`
//!   header, read again by the orchestrator as the `clientApiKey` forwarded
//!   upstream for passthrough providers.
//!
//! Constant-time comparison and the "warn once when auth is disabled" idiom
//! are grounded on `voice-agent-server::auth::auth_middleware`.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

/// Pull the caller-supplied key out of `x-api-key` or `Authorization: Bearer`,
/// in that order.
pub fn extract_inbound_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Gateway-level auth middleware. No-op when `PROXY_API_KEY` was not set at
/// startup.
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = &state.proxy_api_key else {
        if !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!("PROXY_API_KEY is not set; gateway authentication is disabled");
        }
        return next.run(request).await;
    };

    match extract_inbound_key(request.headers()) {
        Some(provided) if constant_time_compare(provided.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => (StatusCode::UNAUTHORIZED, "invalid API key").into_response(),
        None => (StatusCode::UNAUTHORIZED, "missing x-api-key or Authorization header").into_response(),
    }
}
