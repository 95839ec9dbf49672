//! Orchestrator: resolves a `(provider, model)` pair, picks
//! the API key for the request, and hands back everything a route handler
//! needs to dispatch the call. Route handlers (in `routes.rs`) own the
//! actual upstream call and response shaping; this module owns the part that
//! is identical across every endpoint.
//!
//! Grounded on `crates/llm/src/factory.rs::LlmFactory::create` for the
//! "look up config, hand back a ready client" shape, generalized with
//! resolver, rotator, and passthrough-key selection on top.

use std::sync::Arc;

use vandamme_core::{ApiFormat, GatewayError, ProviderConfig, ResolvedTarget, PASSTHROUGH_SENTINEL};
use vandamme_providers::UpstreamClient;

use crate::state::AppState;

/// Everything resolved before the request body is converted or dispatched
/// (orchestration steps 1, 3, 4, 5, 7).
pub struct Orchestrated {
    pub provider: ProviderConfig,
    pub resolved_model: String,
    pub provider_api_key: String,
    pub upstream: UpstreamClient,
}

/// Steps 3-5, 7: resolve the target provider/model, pick the key to send
/// upstream, and fetch the cached HTTP client for that provider.
///
/// `client_api_key` is whatever the inbound request carried in `x-api-key` /
/// `Authorization: Bearer` — required when the target provider uses
/// passthrough (step 5), ignored otherwise.
pub fn resolve(
    state: &AppState,
    model_input: &str,
    provider_hint: Option<&str>,
    client_api_key: Option<&str>,
) -> Result<Orchestrated, GatewayError> {
    let known = state.known_providers();
    let (ResolvedTarget { provider: provider_name, model: resolved_model }, _resolution) =
        state.resolver.resolve(model_input, provider_hint, &known)?;

    let provider = state
        .registry
        .get(&provider_name)
        .ok_or_else(|| GatewayError::UnknownProvider(provider_name.clone()))?;

    let provider_api_key = if provider.uses_passthrough {
        client_api_key
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GatewayError::PassthroughKeyMissing(provider.name.clone()))?
    } else {
        state
            .rotator
            .next_key(&provider.name, &provider.api_keys)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Config(format!("provider '{}' has no configured keys", provider.name)))?
    };
    debug_assert_ne!(provider_api_key, PASSTHROUGH_SENTINEL);

    let upstream = state.clients.client_for(&provider)?;

    Ok(Orchestrated { provider, resolved_model, provider_api_key, upstream })
}

/// Step 6 (matching-format branch): pass the body through, only replacing
/// the `model` field with the resolved model name.
pub fn stamp_model(mut body: serde_json::Value, model: &str) -> serde_json::Value {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("model".to_string(), serde_json::Value::String(model.to_string()));
    }
    body
}

/// Step 8: the optional middleware chain. `Transform` receives the outbound
/// message array plus routing context and may rewrite it; exceptions become
/// `GatewayError::Middleware` (mapped to a 500 by `error_mapper`).
pub trait Middleware: Send + Sync {
    fn transform(
        &self,
        messages: serde_json::Value,
        provider: &str,
        model: &str,
        request_id: &str,
    ) -> Result<serde_json::Value, GatewayError>;
}

pub fn apply_middleware(
    chain: &[Arc<dyn Middleware>],
    mut messages: serde_json::Value,
    provider: &str,
    model: &str,
    request_id: &str,
) -> Result<serde_json::Value, GatewayError> {
    for middleware in chain {
        messages = middleware
            .transform(messages, provider, model, request_id)
            .map_err(|e| GatewayError::Middleware(e.to_string()))?;
    }
    Ok(messages)
}

/// Does the caller's dialect match what this provider speaks? Drives step 6
/// and step 10's dispatch matrix.
pub fn formats_match(inbound: ApiFormat, provider: ApiFormat) -> bool {
    inbound == provider
}
