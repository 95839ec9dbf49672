//! `ProviderConfig` — the immutable, validated description of one upstream
//! backend. Constructed once at startup (or on reload) by `vandamme-config`
//! and handed to `vandamme-providers::ProviderRegistry`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Sentinel key value that marks a provider as passthrough-only.
pub const PASSTHROUGH_SENTINEL: &str = "!PASSTHRU";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    OpenAi,
    Anthropic,
}

impl ApiFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(ApiFormat::OpenAi),
            "anthropic" => Some(ApiFormat::Anthropic),
            _ => None,
        }
    }
}

/// Immutable, validated per-provider configuration.
///
/// Construction is the only place the passthrough invariant is checked:
/// `uses_passthrough` is true iff every key equals [`PASSTHROUGH_SENTINEL`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_version: Option<String>,
    pub api_format: ApiFormat,
    pub timeout: Duration,
    pub max_retries: u32,
    pub tool_name_sanitization: bool,
    pub custom_headers: HashMap<String, String>,
    pub api_keys: Vec<String>,
    pub uses_passthrough: bool,
}

impl ProviderConfig {
    /// Build a provider config, enforcing the passthrough invariant.
    ///
    /// Fails if `api_keys` is empty, or mixes the passthrough sentinel with
    /// real keys.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_version: Option<String>,
        api_format: ApiFormat,
        timeout: Duration,
        max_retries: u32,
        tool_name_sanitization: bool,
        custom_headers: HashMap<String, String>,
        api_keys: Vec<String>,
    ) -> Result<Self, GatewayError> {
        let name = name.into().to_ascii_lowercase();

        if api_keys.is_empty() {
            return Err(GatewayError::Config(format!(
                "provider '{}' has no api keys configured",
                name
            )));
        }

        let passthrough_count = api_keys
            .iter()
            .filter(|k| k.as_str() == PASSTHROUGH_SENTINEL)
            .count();

        let uses_passthrough = if passthrough_count == api_keys.len() {
            true
        } else if passthrough_count == 0 {
            false
        } else {
            return Err(GatewayError::Config(format!(
                "provider '{}' mixes real keys with the {} sentinel",
                name, PASSTHROUGH_SENTINEL
            )));
        };

        Ok(Self {
            name,
            base_url: base_url.into(),
            api_version,
            api_format,
            timeout,
            max_retries,
            tool_name_sanitization,
            custom_headers,
            api_keys,
            uses_passthrough,
        })
    }
}

/// Outcome of registering a provider. A provider with invalid or incomplete
/// configuration (missing base URL, no keys, bad API format, ...) never
/// reaches `ProviderRegistry::register` at all — `vandamme-config`'s
/// discovery pass rejects it first and routes it into `LoadedConfig`'s
/// `provider_errors` list instead — so registration itself always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    Success,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(keys: Vec<&str>) -> Result<ProviderConfig, GatewayError> {
        ProviderConfig::new(
            "OpenAI",
            "https://api.openai.com",
            None,
            ApiFormat::OpenAi,
            Duration::from_secs(30),
            3,
            false,
            HashMap::new(),
            keys.into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn name_is_lowercased() {
        let c = cfg(vec!["sk-1"]).unwrap();
        assert_eq!(c.name, "openai");
    }

    #[test]
    fn all_passthrough_is_accepted() {
        let c = cfg(vec![PASSTHROUGH_SENTINEL]).unwrap();
        assert!(c.uses_passthrough);
    }

    #[test]
    fn all_real_keys_is_accepted() {
        let c = cfg(vec!["sk-1", "sk-2"]).unwrap();
        assert!(!c.uses_passthrough);
    }

    #[test]
    fn mixed_keys_are_rejected() {
        let err = cfg(vec!["sk-1", PASSTHROUGH_SENTINEL]).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let err = cfg(vec![]).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
