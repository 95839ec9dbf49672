//! Turns a [`RawConfig`] flat map into the typed shapes the rest of the
//! workspace consumes: one [`ProviderConfig`] per discovered provider, plus
//! the alias maps `vandamme-aliases::AliasStore` loads at startup.
//!
//! Provider discovery: scan every key for a known provider
//! field suffix (`_API_KEY`, `_BASE_URL`, ...), collect the distinct prefixes
//! that have at least an `_API_KEY` entry, and build one [`ProviderConfig`]
//! per prefix. A provider with no `_API_KEY` key is never discovered, even if
//! other fields are present, rather than silently defaulting credentials. A
//! discovered provider missing any other required field is rejected here,
//! into `LoadedConfig::provider_errors`, before it ever reaches
//! `ProviderRegistry::register`.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use vandamme_core::{ApiFormat, GatewayError, ProviderConfig};

use crate::raw::RawConfig;
use crate::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 2;

const RESERVED_PREFIXES: &[&str] = &["VDM"];

/// Everything `vandamme-config` can derive from one merged [`RawConfig`].
pub struct LoadedConfig {
    pub providers: Vec<ProviderConfig>,
    pub provider_errors: Vec<(String, GatewayError)>,
    pub default_provider: Option<String>,
    /// `provider -> alias -> target`, sourced from env vars and TOML `[provider.<name>.aliases]`.
    pub primary_aliases: HashMap<String, HashMap<String, String>>,
    /// `provider -> alias -> target`, sourced from TOML `[provider.<name>.fallback_aliases]` only.
    pub fallback_aliases: HashMap<String, HashMap<String, String>>,
}

pub fn discover(raw: &RawConfig) -> Result<LoadedConfig, ConfigError> {
    let default_provider = raw.get("VDM_DEFAULT_PROVIDER").map(|s| s.to_ascii_lowercase());
    let provider_names = discover_provider_names(raw);

    let mut providers = Vec::new();
    let mut provider_errors = Vec::new();

    for name in &provider_names {
        match build_provider_config(raw, name) {
            Ok(cfg) => providers.push(cfg),
            Err(e) => provider_errors.push((name.clone(), e)),
        }
    }

    let primary_aliases = discover_aliases(raw, &provider_names, "_ALIAS_", default_provider.as_deref());
    let fallback_aliases = discover_aliases(raw, &provider_names, "_FALLBACK_ALIAS_", None);

    Ok(LoadedConfig {
        providers,
        provider_errors,
        default_provider,
        primary_aliases,
        fallback_aliases,
    })
}

fn discover_provider_names(raw: &RawConfig) -> Vec<String> {
    let mut names = HashSet::new();
    for key in raw.all_keys() {
        let Some(prefix) = key.strip_suffix("_API_KEY") else { continue };
        if prefix.is_empty() || RESERVED_PREFIXES.contains(&prefix) {
            continue;
        }
        names.insert(prefix.to_ascii_lowercase());
    }
    let mut names: Vec<_> = names.into_iter().collect();
    names.sort();
    names
}

fn build_provider_config(raw: &RawConfig, name: &str) -> Result<ProviderConfig, GatewayError> {
    let upper = name.to_ascii_uppercase();

    let api_keys = raw
        .get_list(&format!("{upper}_API_KEY"))
        .ok_or_else(|| GatewayError::Config(format!("provider '{name}' has no api keys")))?;

    let base_url = raw
        .get(&format!("{upper}_BASE_URL"))
        .ok_or_else(|| GatewayError::Config(format!("provider '{name}' has no base_url")))?
        .to_string();

    let api_format = raw
        .get(&format!("{upper}_API_FORMAT"))
        .and_then(ApiFormat::parse)
        .ok_or_else(|| {
            GatewayError::Config(format!(
                "provider '{name}' has missing or invalid api_format (expected 'openai' or 'anthropic')"
            ))
        })?;

    let api_version = raw.get(&format!("{upper}_API_VERSION")).map(|s| s.to_string());

    let timeout = raw
        .get_duration_secs(&format!("{upper}_TIMEOUT"))
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

    let max_retries = raw
        .get_u32(&format!("{upper}_MAX_RETRIES"))
        .unwrap_or(DEFAULT_MAX_RETRIES);

    let tool_name_sanitization = raw
        .get_bool(&format!("{upper}_TOOL_NAME_SANITIZATION"))
        .unwrap_or(false);

    let custom_headers = collect_custom_headers(raw, &upper);

    ProviderConfig::new(
        name,
        base_url,
        api_version,
        api_format,
        timeout,
        max_retries,
        tool_name_sanitization,
        custom_headers,
        api_keys,
    )
}

/// `{PROVIDER}_CUSTOM_HEADER_{NAME}` -> forwarded header `Name` (dash-cased:
/// each underscore-delimited segment capitalized, joined by hyphens, e.g.
/// `X_FOO_BAR` becomes `X-Foo-Bar`).
fn collect_custom_headers(raw: &RawConfig, provider_upper: &str) -> HashMap<String, String> {
    let prefix = format!("{provider_upper}_CUSTOM_HEADER_");
    raw.keys_with_prefix(&prefix)
        .map(|(suffix, value)| (dash_case(suffix), value.to_string()))
        .collect()
}

fn dash_case(segment: &str) -> String {
    segment
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Collect `{provider}{infix}{ALIAS}=target` keys into `provider -> alias -> target`.
///
/// When `default_provider` is `Some`, bare `VDM{infix}{ALIAS}` keys (no
/// provider prefix) are folded into that provider's map too, treating an
/// unscoped alias as scoped to the default provider.
fn discover_aliases(
    raw: &RawConfig,
    provider_names: &[String],
    infix: &str,
    default_provider: Option<&str>,
) -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    for name in provider_names {
        let prefix = format!("{}{}", name.to_ascii_uppercase(), infix);
        for (alias, target) in raw.keys_with_prefix(&prefix) {
            if alias.is_empty() {
                continue;
            }
            out.entry(name.clone())
                .or_default()
                .insert(alias.to_ascii_lowercase(), target.to_string());
        }
    }

    if let Some(default_provider) = default_provider {
        let vdm_prefix = format!("VDM{infix}");
        for (alias, target) in raw.keys_with_prefix(&vdm_prefix) {
            if alias.is_empty() {
                continue;
            }
            out.entry(default_provider.to_string())
                .or_default()
                .entry(alias.to_ascii_lowercase())
                .or_insert_with(|| target.to_string());
        }
    }

    out
}
