//! The gateway's error taxonomy.
//!
//! One enum covers every typed error kind the proxy can produce: client-facing
//! 4xx causes, upstream failures, and the handful of self-healing cases
//! (`SSEParseError`, `AliasCycleDetected`, `AliasChainTooLong`) that are
//! recovered locally rather than surfaced. `vandamme-server::error_mapper`
//! is the only place this enum is translated into an HTTP response or an SSE
//! error frame.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid model name: {0}")]
    InvalidModelName(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("passthrough key missing for provider {0}")]
    PassthroughKeyMissing(String),

    #[error("upstream timeout")]
    UpstreamTimeout,

    #[error("upstream http error {status}: {body}")]
    UpstreamHttpError { status: u16, body: String },

    #[error("streaming cancelled")]
    StreamingCancelled,

    #[error("streaming internal error: {0}")]
    StreamingInternal(String),

    #[error("sse parse error: {0}")]
    SseParseError(String),

    #[error("alias cycle detected while resolving {0}")]
    AliasCycleDetected(String),

    #[error("alias chain too long while resolving {0}")]
    AliasChainTooLong(String),

    #[error("middleware error: {0}")]
    Middleware(String),

    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl GatewayError {
    /// Whether this error kind is recovered locally instead of surfacing to
    /// the request boundary.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            GatewayError::SseParseError(_)
                | GatewayError::AliasCycleDetected(_)
                | GatewayError::AliasChainTooLong(_)
        )
    }
}

/// The error-event shape written onto an SSE stream.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SseErrorEvent {
    pub error: SseErrorBody,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SseErrorBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub code: &'static str,
    pub message: String,
    pub suggestion: &'static str,
}

impl SseErrorEvent {
    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self {
            error: SseErrorBody {
                kind: "upstream_timeout",
                code: "read_timeout",
                message: message.into(),
                suggestion: "retry the request or increase streaming_read_timeout",
            },
        }
    }

    pub fn upstream_http_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            error: SseErrorBody {
                kind: "upstream_http_error",
                code: "http_error",
                message: message.into(),
                suggestion: "check upstream provider status and credentials",
            },
        }
        .with_status_in_message(status)
    }

    pub fn streaming_error(message: impl Into<String>) -> Self {
        Self {
            error: SseErrorBody {
                kind: "streaming_error",
                code: "internal",
                message: message.into(),
                suggestion: "retry the request",
            },
        }
    }

    fn with_status_in_message(mut self, status: u16) -> Self {
        self.error.message = format!("status {}: {}", status, self.error.message);
        self
    }

    pub fn to_sse_frame(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
        )
    }
}
