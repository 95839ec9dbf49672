//! HTTP-surface integration tests: router wiring, auth enforcement, and
//! request validation that fails before any upstream call is made.
//!
//! Grounded on `voice-agent-server::http`'s `oneshot`-based router tests;
//! extended with the gateway's own resolution/rotation scenarios run through
//! `AppState` directly, the way `crates/providers/src/rotation.rs`'s
//! concurrency test exercises `KeyRotator` under real thread concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use vandamme_aliases::ModelResolver;
use vandamme_core::{ApiFormat, GatewayError, ProviderConfig, PASSTHROUGH_SENTINEL};
use vandamme_providers::{ClientFactory, KeyRotator, ProviderRegistry};
use vandamme_server::state::AppState;
use vandamme_server::{create_router, orchestrator};

fn provider(name: &str, format: ApiFormat, keys: Vec<String>) -> ProviderConfig {
    ProviderConfig::new(name, "https://example.invalid", None, format, Duration::from_secs(5), 1, false, HashMap::new(), keys)
        .unwrap()
}

fn state_with_openai_default(proxy_api_key: Option<String>) -> AppState {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(provider("openai", ApiFormat::OpenAi, vec!["sk-a".to_string(), "sk-b".to_string(), "sk-c".to_string()]));
    let resolver = Arc::new(ModelResolver::new());
    resolver.set_default_provider(Some("openai".to_string()));
    AppState::new(registry, Arc::new(KeyRotator::new()), Arc::new(ClientFactory::new()), resolver, proxy_api_key)
}

fn prometheus_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_reachable_without_a_body() {
    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_is_not_behind_auth() {
    let app = create_router(state_with_openai_default(Some("secret".to_string())), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_key_is_rejected_when_auth_is_configured() {
    let app = create_router(state_with_openai_default(Some("secret".to_string())), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let app = create_router(state_with_openai_default(Some("secret".to_string())), prometheus_handle());
    let request = Request::builder().uri("/v1/models").header("x-api-key", "wrong").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn correct_key_via_bearer_header_is_accepted() {
    let app = create_router(state_with_openai_default(Some("secret".to_string())), prometheus_handle());
    let request = Request::builder().uri("/v1/models").header("authorization", "Bearer secret").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_disabled_when_no_proxy_key_is_configured() {
    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn models_and_aliases_endpoints_return_structured_bodies() {
    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap()).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"][0], "openai");

    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let response = app.oneshot(Request::builder().uri("/v1/aliases").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_provider_in_chat_completions_returns_400_without_a_network_call() {
    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let body = serde_json::json!({ "model": "ghost:gpt-4o", "messages": [] }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "unknown_provider");
}

#[tokio::test]
async fn anthropic_provider_via_chat_completions_is_redirected_to_messages() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(provider("anthropic", ApiFormat::Anthropic, vec!["sk-ant".to_string()]));
    let resolver = Arc::new(ModelResolver::new());
    resolver.set_default_provider(Some("anthropic".to_string()));
    let state = AppState::new(registry, Arc::new(KeyRotator::new()), Arc::new(ClientFactory::new()), resolver, None);
    let app = create_router(state, prometheus_handle());

    let body = serde_json::json!({ "model": "anthropic:claude-3-opus", "messages": [] }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]["message"].as_str().unwrap().contains("/v1/messages"));
}

#[tokio::test]
async fn count_tokens_approximates_from_message_length() {
    let app = create_router(state_with_openai_default(None), prometheus_handle());
    let body = serde_json::json!({
        "model": "openai:gpt-4o",
        "max_tokens": 16,
        "messages": [{ "role": "user", "content": "abcdefgh" }],
    })
    .to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/messages/count_tokens")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["input_tokens"], 2);
}

/// Exercises alias resolution, provider lookup and passthrough-vs-rotator key
/// selection together, the way a request actually flows through
/// `orchestrator::resolve` before any upstream call is made.
#[tokio::test]
async fn literal_escape_bypasses_alias_resolution() {
    let state = state_with_openai_default(None);
    let resolved = orchestrator::resolve(&state, "!openai:gpt-4o-mini", None, None).unwrap();
    assert_eq!(resolved.provider.name, "openai");
    assert_eq!(resolved.resolved_model, "gpt-4o-mini");
}

#[tokio::test]
async fn alias_resolves_through_the_default_provider() {
    let state = state_with_openai_default(None);
    state.resolver.store().add_env_alias("openai", "fast", "gpt-4o-mini").unwrap();
    let resolved = orchestrator::resolve(&state, "fast", None, None).unwrap();
    assert_eq!(resolved.provider.name, "openai");
    assert_eq!(resolved.resolved_model, "gpt-4o-mini");
}

#[tokio::test]
async fn passthrough_provider_without_a_client_key_is_rejected_before_dispatch() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(provider("poe", ApiFormat::OpenAi, vec![PASSTHROUGH_SENTINEL.to_string()]));
    let resolver = Arc::new(ModelResolver::new());
    resolver.set_default_provider(Some("poe".to_string()));
    let state = AppState::new(registry, Arc::new(KeyRotator::new()), Arc::new(ClientFactory::new()), resolver, None);

    let err = orchestrator::resolve(&state, "poe:grok-2", None, None).unwrap_err();
    assert!(matches!(err, GatewayError::PassthroughKeyMissing(_)));
}

/// Six concurrent requests against a three-key provider must each see a
/// distinct rotator key, every key used exactly twice.
#[tokio::test]
async fn six_concurrent_requests_round_robin_across_three_keys() {
    let state = Arc::new(state_with_openai_default(None));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { orchestrator::resolve(&state, "openai:gpt-4o", None, None).unwrap().provider_api_key })
        })
        .collect();

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap());
    }
    keys.sort();
    assert_eq!(keys, vec!["sk-a", "sk-a", "sk-b", "sk-b", "sk-c", "sk-c"]);
}
