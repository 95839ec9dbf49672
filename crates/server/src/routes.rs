//! HTTP surface: route table plus one handler per endpoint.
//!
//! Grounded on `voice-agent-server::http::create_router` for the router
//! layering order (CORS → trace → compression → auth → state) and its
//! `test_router_creation`-style smoke test.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use vandamme_convert::{anthropic_to_openai, openai_to_anthropic, AnthropicRequest, OaToClaudeMachine, OpenAiRequest, OpenAiResponse};
use vandamme_core::{ApiFormat, GatewayError};

use crate::auth::{auth_middleware, extract_inbound_key};
use crate::metrics::RequestMetrics;
use crate::orchestrator::{self, formats_match};
use crate::state::AppState;
use crate::streaming::{oa_to_claude_frames, passthrough_frames, StreamingPipeline};

pub fn create_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let api = Router::new()
        .route("/v1/messages", post(handle_messages))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/messages/count_tokens", post(handle_count_tokens))
        .route("/v1/models", get(list_models))
        .route("/v1/aliases", get(list_aliases))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let metrics_route = Router::new().route("/metrics", get(metrics_endpoint)).with_state(prometheus_handle);

    api.merge(metrics_route)
}

async fn metrics_endpoint(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let providers: Vec<_> = state
        .registry
        .list()
        .into_iter()
        .map(|name| {
            let ready = state.registry.get(&name).is_some();
            serde_json::json!({ "provider": name, "ready": ready })
        })
        .collect();
    Json(serde_json::json!({ "status": "ok", "providers": providers }))
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    provider: Option<String>,
    #[allow(dead_code)]
    format: Option<String>,
}

async fn list_models(State(state): State<AppState>, Query(q): Query<ModelsQuery>) -> Json<serde_json::Value> {
    let names = state.registry.list();
    let filtered: Vec<_> = names.into_iter().filter(|n| q.provider.as_deref().map_or(true, |p| p == n)).collect();
    Json(serde_json::json!({ "data": filtered }))
}

async fn list_aliases(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for (provider, alias, _target) in state.resolver.store().all_primary_candidates() {
        grouped.entry(provider).or_default().push(alias);
    }
    Json(serde_json::json!({
        "aliases": grouped,
        "derived": ["top", "top-cheap", "top-longctx"],
    }))
}

async fn handle_count_tokens(Json(req): Json<AnthropicRequest>) -> Json<serde_json::Value> {
    let chars: usize = req
        .messages
        .iter()
        .map(|m| match &m.content {
            vandamme_convert::anthropic_types::MessageContent::Text(t) => t.len(),
            vandamme_convert::anthropic_types::MessageContent::Blocks(_) => 0,
        })
        .sum();
    Json(serde_json::json!({ "input_tokens": (chars / 4).max(1) }))
}

fn inbound_key(headers: &HeaderMap) -> Option<String> {
    extract_inbound_key(headers)
}

async fn handle_messages(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<AnthropicRequest>) -> Response {
    match dispatch_messages(&state, headers, req).await {
        Ok(response) => response,
        Err(err) => crate::error_mapper::to_response(err),
    }
}

async fn dispatch_messages(state: &AppState, headers: HeaderMap, req: AnthropicRequest) -> Result<Response, GatewayError> {
    let request_id = vandamme_core::new_request_id();
    let mut metrics = RequestMetrics::start();
    let client_key = inbound_key(&headers);

    let orchestrator::Orchestrated { provider, resolved_model, provider_api_key, upstream } =
        orchestrator::resolve(state, &req.model, None, client_key.as_deref())?;
    metrics.resolved(&provider.name, &resolved_model);

    let is_streaming = req.stream.unwrap_or(false);
    let url = upstream.endpoint_url(&provider, &resolved_model);

    if formats_match(ApiFormat::Anthropic, provider.api_format) {
        let body = orchestrator::stamp_model(serde_json::to_value(&req).unwrap(), &resolved_model);
        let resp = upstream.send_to(&url, &provider, &provider_api_key, body).await?;
        if is_streaming {
            return Ok(sse_response(StreamingPipeline::wrap(passthrough_frames(resp), metrics, disconnect_flag())));
        }
        let status = resp.status();
        metrics.end(if status.is_success() { "ok" } else { "error" });
        let bytes = resp.bytes().await.map_err(GatewayError::from)?;
        return Ok((StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK), bytes).into_response());
    }

    // Mismatched formats: provider speaks OpenAI, client spoke Anthropic.
    let (openai_req, tool_names) = anthropic_to_openai(&req, &resolved_model, provider.tool_name_sanitization)?;
    let body = serde_json::to_value(&openai_req).map_err(|e| GatewayError::StreamingInternal(e.to_string()))?;
    let resp = upstream.send_to(&url, &provider, &provider_api_key, body).await?;

    if is_streaming {
        let machine = OaToClaudeMachine::new(request_id, resolved_model, tool_names);
        return Ok(sse_response(StreamingPipeline::wrap(oa_to_claude_frames(resp, machine), metrics, disconnect_flag())));
    }

    let status = resp.status();
    let openai_resp: OpenAiResponse = resp.json().await.map_err(GatewayError::from)?;
    let anthropic_resp = openai_to_anthropic(&openai_resp, &tool_names);
    metrics.end(if status.is_success() { "ok" } else { "error" });
    Ok((StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK), Json(anthropic_resp)).into_response())
}

async fn handle_chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<OpenAiRequest>) -> Response {
    match dispatch_chat_completions(&state, headers, req).await {
        Ok(response) => response,
        Err(err) => crate::error_mapper::to_response(err),
    }
}

async fn dispatch_chat_completions(
    state: &AppState,
    headers: HeaderMap,
    req: OpenAiRequest,
) -> Result<Response, GatewayError> {
    let mut metrics = RequestMetrics::start();
    let client_key = inbound_key(&headers);

    let orchestrator::Orchestrated { provider, resolved_model, provider_api_key, upstream } =
        orchestrator::resolve(state, &req.model, None, client_key.as_deref())?;
    metrics.resolved(&provider.name, &resolved_model);

    let is_streaming = req.stream.unwrap_or(false);
    let url = upstream.endpoint_url(&provider, &resolved_model);

    if !formats_match(ApiFormat::OpenAi, provider.api_format) {
        // No inverse (OpenAI request → Anthropic request) converter exists,
        // only Anthropic → OpenAI request and OpenAI → Anthropic response.
        // Route Anthropic-format providers through /v1/messages instead.
        return Err(GatewayError::MissingRequiredField(format!(
            "provider '{}' speaks the Anthropic dialect; call /v1/messages instead of /v1/chat/completions",
            provider.name
        )));
    }

    let body = orchestrator::stamp_model(serde_json::to_value(&req).unwrap(), &resolved_model);
    let resp = upstream.send_to(&url, &provider, &provider_api_key, body).await?;

    if is_streaming {
        return Ok(sse_response(StreamingPipeline::wrap(passthrough_frames(resp), metrics, disconnect_flag())));
    }

    let status = resp.status();
    metrics.end(if status.is_success() { "ok" } else { "error" });
    let bytes = resp.bytes().await.map_err(GatewayError::from)?;
    Ok((StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK), bytes).into_response())
}

fn disconnect_flag() -> crate::streaming::DisconnectFlag {
    Arc::new(AtomicBool::new(false))
}

fn sse_response(stream: impl futures::Stream<Item = bytes::Bytes> + Send + 'static) -> Response {
    let body = axum::body::Body::from_stream(stream.map(Ok::<_, std::convert::Infallible>));
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("access-control-allow-origin", "*")
        .body(body)
        .unwrap()
}

use futures::StreamExt as _;
