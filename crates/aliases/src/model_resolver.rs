//! `ModelResolver` — literal escape, provider-prefix parsing, cache lookup,
//! and the alias-resolution pipeline, combined into the single entry point
//! the gateway calls per request.

use parking_lot::RwLock;
use vandamme_core::{GatewayError, ResolutionResult, ResolvedTarget};

use crate::cache::{AliasCache, CacheStats};
use crate::resolver::{resolve as resolve_alias, ResolveRequest};
use crate::store::{normalize, AliasStore};

/// Implemented by whatever owns the set of configured provider names —
/// `vandamme-providers::ProviderRegistry` in production, a plain set in
/// tests. Kept as a trait so this crate never depends on `vandamme-providers`.
pub trait KnownProviders {
    fn is_configured(&self, name: &str) -> bool;
}

pub struct ModelResolver {
    store: AliasStore,
    cache: AliasCache<(ResolvedTarget, ResolutionResult)>,
    default_provider: RwLock<Option<String>>,
}

impl ModelResolver {
    pub fn new() -> Self {
        Self {
            store: AliasStore::new(),
            cache: AliasCache::new(),
            default_provider: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &AliasStore {
        &self.store
    }

    pub fn set_default_provider(&self, provider: Option<String>) {
        *self.default_provider.write() = provider;
    }

    pub fn default_provider(&self) -> Option<String> {
        self.default_provider.read().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats(self.store.generation())
    }

    /// Resolve an inbound `model` string (plus an optional caller-supplied
    /// provider hint) into a concrete `(provider, model)` pair.
    pub fn resolve(
        &self,
        model: &str,
        provider_hint: Option<&str>,
        known: &dyn KnownProviders,
    ) -> Result<(ResolvedTarget, ResolutionResult), GatewayError> {
        if let Some(rest) = model.strip_prefix('!') {
            return self.resolve_literal(rest, known);
        }

        let default_provider_binding = self.default_provider();
        let (provider, rest, provider_explicit) = split_prefix(model, provider_hint, default_provider_binding.as_deref(), known);

        let cache_key = format!("{provider_explicit}|{provider}|{}", normalize(rest));
        let generation = self.store.generation();

        if let Some(hit) = self.cache.get(&cache_key, generation) {
            return Ok(hit);
        }

        let default_provider = self.default_provider();
        let request = ResolveRequest {
            rest,
            provider: &provider,
            provider_explicit,
            default_provider: default_provider.as_deref(),
        };
        let (resolved_provider, result) = resolve_alias(&self.store, &request);

        if !known.is_configured(&resolved_provider) {
            return Err(GatewayError::UnknownProvider(resolved_provider));
        }

        let target = ResolvedTarget { provider: resolved_provider, model: result.resolved_model.clone() };
        self.cache.put(cache_key, (target.clone(), result.clone()), generation);

        Ok((target, result))
    }

    fn resolve_literal(
        &self,
        rest: &str,
        known: &dyn KnownProviders,
    ) -> Result<(ResolvedTarget, ResolutionResult), GatewayError> {
        let (provider, model) = match rest.split_once(':') {
            Some((left, right)) if known.is_configured(left) => (left.to_string(), right.to_string()),
            _ => {
                let default = self
                    .default_provider()
                    .ok_or_else(|| GatewayError::Config("no default provider configured for literal escape".to_string()))?;
                (default, rest.to_string())
            }
        };

        if !known.is_configured(&provider) {
            return Err(GatewayError::UnknownProvider(provider));
        }

        let result = ResolutionResult {
            resolved_model: format!("{provider}:{model}"),
            was_resolved: false,
            resolution_path: Vec::new(),
            best_match: None,
        };
        Ok((ResolvedTarget { provider, model }, result))
    }
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Does `model` carry an explicit `prov:rest` prefix where `prov` is
/// configured? If so use it; otherwise fall back to the caller hint, then
/// the default provider.
fn split_prefix<'a>(
    model: &'a str,
    provider_hint: Option<&'a str>,
    default_provider: Option<&'a str>,
    known: &dyn KnownProviders,
) -> (String, &'a str, bool) {
    if let Some((left, right)) = model.split_once(':') {
        if !left.is_empty() && !right.is_empty() && known.is_configured(left) {
            return (normalize(left), right, true);
        }
    }

    let provider = provider_hint
        .map(normalize)
        .or_else(|| default_provider.map(normalize))
        .unwrap_or_default();
    (provider, model, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Providers(HashSet<&'static str>);
    impl KnownProviders for Providers {
        fn is_configured(&self, name: &str) -> bool {
            self.0.contains(name)
        }
    }

    #[test]
    fn alias_via_default_provider() {
        let resolver = ModelResolver::new();
        resolver.set_default_provider(Some("poe".to_string()));
        resolver.store().add_env_alias("poe", "haiku", "grok-4.1-fast").unwrap();
        let known = Providers(["poe"].into_iter().collect());

        let (target, result) = resolver.resolve("haiku", None, &known).unwrap();
        assert_eq!(target.provider, "poe");
        assert_eq!(target.model, "grok-4.1-fast");
        assert!(result.was_resolved);
    }

    #[test]
    fn cross_provider_alias_via_explicit_prefix() {
        let resolver = ModelResolver::new();
        resolver.set_default_provider(Some("openai".to_string()));
        resolver.store().add_env_alias("openai", "cheap", "poe:glm-4.6").unwrap();
        let known = Providers(["openai", "poe"].into_iter().collect());

        let (target, _) = resolver.resolve("openai:cheap", None, &known).unwrap();
        assert_eq!(target.provider, "poe");
        assert_eq!(target.model, "glm-4.6");

        let (target, _) = resolver.resolve("cheap", None, &known).unwrap();
        assert_eq!(target.provider, "poe");
        assert_eq!(target.model, "glm-4.6");
    }

    #[test]
    fn literal_escape_bypasses_alias_lookup() {
        let resolver = ModelResolver::new();
        resolver.store().add_env_alias("openai", "haiku", "should-not-be-used").unwrap();
        let known = Providers(["openai"].into_iter().collect());

        let (target, result) = resolver.resolve("!openai:haiku", None, &known).unwrap();
        assert_eq!(target.provider, "openai");
        assert_eq!(target.model, "haiku");
        assert!(!result.was_resolved);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let resolver = ModelResolver::new();
        let known = Providers(HashSet::new());
        let err = resolver.resolve("ghost:model", None, &known).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownProvider(_)));
    }

    #[test]
    fn repeated_resolution_hits_cache() {
        let resolver = ModelResolver::new();
        resolver.set_default_provider(Some("poe".to_string()));
        resolver.store().add_env_alias("poe", "haiku", "grok-4.1-fast").unwrap();
        let known = Providers(["poe"].into_iter().collect());

        resolver.resolve("haiku", None, &known).unwrap();
        resolver.resolve("haiku", None, &known).unwrap();
        assert_eq!(resolver.cache_stats().hits, 1);
    }
}
