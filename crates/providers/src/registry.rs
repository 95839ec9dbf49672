//! `ProviderRegistry` — the in-memory table of configured upstream providers.
//!
//! Grounded on `crates/llm/src/factory.rs::LlmFactory`'s typed-config-to-backend
//! dispatch, generalized from "one backend, fixed at startup" to "many
//! providers, registered and re-registered as configuration reloads".

use std::collections::HashMap;

use dashmap::DashMap;
use vandamme_core::{LoadResult, ProviderConfig};

/// Thread-safe provider table. Cheap to clone (wraps a `DashMap` behind
/// `Arc` implicitly via `AppState`'s own `Arc<ProviderRegistry>`).
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a provider. Always succeeds — validation already
    /// happened in `ProviderConfig::new`.
    pub fn register(&self, config: ProviderConfig) -> LoadResult {
        self.providers.insert(config.name.clone(), config);
        LoadResult::Success
    }

    pub fn get(&self, name: &str) -> Option<ProviderConfig> {
        self.providers.get(&name.to_ascii_lowercase()).map(|r| r.clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.providers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Replace the entire table atomically from a freshly loaded config,
    /// dropping providers that disappeared. Used on config hot-reload.
    pub fn replace_all(&self, configs: Vec<ProviderConfig>) {
        let mut fresh = HashMap::new();
        for cfg in configs {
            fresh.insert(cfg.name.clone(), cfg);
        }
        self.providers.retain(|name, _| fresh.contains_key(name));
        for (name, cfg) in fresh {
            self.providers.insert(name, cfg);
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
