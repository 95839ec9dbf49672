//! Translate [`GatewayError`] into an HTTP response (non-streaming) or an
//! SSE error frame (streaming).
//!
//! Grounded on `voice-agent-server::ServerError`'s `From<ServerError> for
//! StatusCode` table: one `match` at the edge, nowhere else in the codebase.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use vandamme_core::{GatewayError, SseErrorEvent};

pub fn status_code(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
        GatewayError::UnknownModel(_) => StatusCode::BAD_REQUEST,
        GatewayError::MissingRequiredField(_) => StatusCode::BAD_REQUEST,
        GatewayError::InvalidModelName(_) => StatusCode::BAD_REQUEST,
        GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
        GatewayError::PassthroughKeyMissing(_) => StatusCode::UNAUTHORIZED,
        GatewayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::UpstreamHttpError { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::StreamingCancelled => StatusCode::from_u16(499).unwrap(),
        GatewayError::StreamingInternal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::SseParseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::AliasCycleDetected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::AliasChainTooLong(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Middleware(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Render a non-streaming error response body: `{"error": {"type": ..., "message": ...}}`.
pub fn to_response(err: GatewayError) -> Response {
    let status = status_code(&err);
    let kind = error_kind(&err);
    let body = Json(serde_json::json!({ "error": { "type": kind, "message": err.to_string() } }));
    (status, body).into_response()
}

fn error_kind(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Config(_) => "config_error",
        GatewayError::UnknownProvider(_) => "unknown_provider",
        GatewayError::UnknownModel(_) => "unknown_model",
        GatewayError::MissingRequiredField(_) => "missing_required_field",
        GatewayError::InvalidModelName(_) => "invalid_model_name",
        GatewayError::Unauthorized => "unauthorized",
        GatewayError::PassthroughKeyMissing(_) => "passthrough_key_missing",
        GatewayError::UpstreamTimeout => "upstream_timeout",
        GatewayError::UpstreamHttpError { .. } => "upstream_http_error",
        GatewayError::StreamingCancelled => "streaming_cancelled",
        GatewayError::StreamingInternal(_) => "streaming_error",
        GatewayError::SseParseError(_) => "sse_parse_error",
        GatewayError::AliasCycleDetected(_) => "alias_cycle_detected",
        GatewayError::AliasChainTooLong(_) => "alias_chain_too_long",
        GatewayError::Middleware(_) => "middleware_error",
        GatewayError::Network(_) => "upstream_http_error",
    }
}

/// Render the SSE error frame for the streaming path, followed
/// by the dialect-appropriate terminator.
pub fn to_sse_frame(err: &GatewayError) -> String {
    match err {
        GatewayError::UpstreamTimeout => SseErrorEvent::upstream_timeout(err.to_string()).to_sse_frame(),
        GatewayError::UpstreamHttpError { status, body } => {
            SseErrorEvent::upstream_http_error(*status, body.clone()).to_sse_frame()
        }
        other => SseErrorEvent::streaming_error(other.to_string()).to_sse_frame(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(status_code(&GatewayError::Unauthorized), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unknown_model_maps_to_400() {
        assert_eq!(status_code(&GatewayError::UnknownModel("x".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn streaming_cancelled_maps_to_499() {
        assert_eq!(status_code(&GatewayError::StreamingCancelled).as_u16(), 499);
    }

    #[test]
    fn sse_frame_for_timeout_has_expected_shape() {
        let frame = to_sse_frame(&GatewayError::UpstreamTimeout);
        assert!(frame.starts_with("data: "));
        assert!(frame.contains("upstream_timeout"));
    }
}
