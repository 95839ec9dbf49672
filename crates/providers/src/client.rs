//! `UpstreamClient` — builds the URL, headers and retry loop for one
//! provider request.
//!
//! URL/header switching is grounded on `crates/llm/src/backend.rs::OpenAIBackend`
//! (`chat_url`/`build_headers`, Azure vs plain-OpenAI branch on
//! `api_version.is_some()`); the `x-api-key`/`anthropic-version` header pair
//! is grounded on `crates/llm/src/claude.rs::ClaudeBackend`. The
//! retry-with-backoff loop is grounded on
//! `OllamaBackend::generate_with_context`'s `for attempt in 0..=max_retries`
//! loop, adapted to retry only up to (and not past) the first received byte:
//! once any response byte has reached the client, retrying would duplicate
//! already-forwarded tokens.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};

use vandamme_core::{ApiFormat, GatewayError, ProviderConfig};

const ANTHROPIC_VERSION_HEADER: &str = "anthropic-version";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
}

impl UpstreamClient {
    pub fn build(provider: &ProviderConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(provider.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }

    pub fn endpoint_url(&self, provider: &ProviderConfig, model: &str) -> String {
        let base = provider.base_url.trim_end_matches('/');
        match (provider.api_format, &provider.api_version) {
            (ApiFormat::OpenAi, Some(api_version)) => {
                // Azure OpenAI: {base}/openai/deployments/{model}/chat/completions?api-version={v}
                format!("{base}/openai/deployments/{model}/chat/completions?api-version={api_version}")
            }
            (ApiFormat::OpenAi, None) => format!("{base}/chat/completions"),
            (ApiFormat::Anthropic, _) => format!("{base}/v1/messages"),
        }
    }

    pub fn build_headers(&self, provider: &ProviderConfig, api_key: &str) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match (provider.api_format, &provider.api_version) {
            (ApiFormat::OpenAi, Some(_)) => {
                let val = header_value(api_key)?;
                headers.insert("api-key", val);
            }
            (ApiFormat::OpenAi, None) => {
                let val = header_value(&format!("Bearer {api_key}"))?;
                headers.insert(AUTHORIZATION, val);
            }
            (ApiFormat::Anthropic, _) => {
                headers.insert("x-api-key", header_value(api_key)?);
                let version = provider.api_version.as_deref().unwrap_or(DEFAULT_ANTHROPIC_VERSION);
                headers.insert(ANTHROPIC_VERSION_HEADER, header_value(version)?);
            }
        }

        for (name, value) in &provider.custom_headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::Config(format!("invalid custom header name '{name}': {e}")))?;
            headers.insert(header_name, header_value(value)?);
        }

        Ok(headers)
    }

    /// Send one request, retrying up to `provider.max_retries` times on
    /// network errors or 5xx responses, before the first response byte is
    /// observed. Returns the raw [`Response`] so the caller can decide
    /// whether to buffer it (non-streaming) or drain it as SSE (streaming).
    ///
    /// `url` is expected to come from [`UpstreamClient::endpoint_url`].
    pub async fn send_to(
        &self,
        url: &str,
        provider: &ProviderConfig,
        api_key: &str,
        body: serde_json::Value,
    ) -> Result<Response, GatewayError> {
        let headers = self.build_headers(provider, api_key)?;

        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = None;

        for attempt in 0..=provider.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    provider = provider.name,
                    attempt,
                    max_retries = provider.max_retries,
                    "retrying upstream request after {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            let result = self
                .http
                .post(url)
                .headers(headers.clone())
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_server_error() => {
                    last_error = Some(GatewayError::UpstreamHttpError {
                        status: response.status().as_u16(),
                        body: response.status().to_string(),
                    });
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => last_error = Some(GatewayError::UpstreamTimeout),
                Err(e) => last_error = Some(GatewayError::from(e)),
            }
        }

        Err(last_error.unwrap_or(GatewayError::UpstreamTimeout))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(value).map_err(|e| GatewayError::Config(format!("invalid header value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn openai(api_version: Option<&str>) -> ProviderConfig {
        ProviderConfig::new(
            "openai",
            "https://api.openai.com/v1",
            api_version.map(String::from),
            ApiFormat::OpenAi,
            Duration::from_secs(30),
            1,
            false,
            HashMap::new(),
            vec!["sk-test".into()],
        )
        .unwrap()
    }

    fn anthropic() -> ProviderConfig {
        ProviderConfig::new(
            "anthropic",
            "https://api.anthropic.com",
            None,
            ApiFormat::Anthropic,
            Duration::from_secs(30),
            1,
            false,
            HashMap::new(),
            vec!["sk-ant-test".into()],
        )
        .unwrap()
    }

    #[test]
    fn plain_openai_url_has_no_query_string() {
        let client = UpstreamClient::build(&openai(None)).unwrap();
        assert_eq!(
            client.endpoint_url(&openai(None), "gpt-4o"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn azure_url_embeds_deployment_and_api_version() {
        let provider = openai(Some("2024-02-01"));
        let client = UpstreamClient::build(&provider).unwrap();
        let url = client.endpoint_url(&provider, "gpt4-deployment");
        assert!(url.contains("/openai/deployments/gpt4-deployment/chat/completions"));
        assert!(url.contains("api-version=2024-02-01"));
    }

    #[test]
    fn azure_headers_use_api_key_not_bearer() {
        let provider = openai(Some("2024-02-01"));
        let client = UpstreamClient::build(&provider).unwrap();
        let headers = client.build_headers(&provider, "secret").unwrap();
        assert!(headers.contains_key("api-key"));
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn plain_openai_headers_use_bearer() {
        let provider = openai(None);
        let client = UpstreamClient::build(&provider).unwrap();
        let headers = client.build_headers(&provider, "secret").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[test]
    fn anthropic_headers_include_version_and_x_api_key() {
        let provider = anthropic();
        let client = UpstreamClient::build(&provider).unwrap();
        let headers = client.build_headers(&provider, "secret").unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(headers.get(ANTHROPIC_VERSION_HEADER).unwrap(), DEFAULT_ANTHROPIC_VERSION);
    }

    #[test]
    fn custom_headers_are_forwarded() {
        let mut provider = anthropic();
        provider.custom_headers.insert("X-Org-Id".to_string(), "org-123".to_string());
        let client = UpstreamClient::build(&provider).unwrap();
        let headers = client.build_headers(&provider, "secret").unwrap();
        assert_eq!(headers.get("X-Org-Id").unwrap(), "org-123");
    }
}
