//! `AliasStore` — the two-level `provider -> alias -> target` map plus its
//! lower-priority fallback layer.
//!
//! Grounded on `crates/server/src/state.rs::AppState`'s
//! `Arc<parking_lot::RwLock<Settings>>` idiom for shared mutable state — a
//! reader-writer lock around a plain map, since reads (one per inbound
//! request) vastly outnumber writes (one per config reload).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use vandamme_core::GatewayError;

/// Lowercase and fold hyphens to underscores — the normalized form every
/// alias and provider name is indexed and looked up by.
pub fn normalize(s: &str) -> String {
    s.to_ascii_lowercase().replace('-', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasLayer {
    Primary,
    Fallback,
}

type AliasMap = HashMap<String, HashMap<String, String>>;

#[derive(Default)]
pub struct AliasStore {
    primary: RwLock<AliasMap>,
    fallback: RwLock<AliasMap>,
    generation: AtomicU64,
}

impl AliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one alias in the primary layer. Rejects empty (after
    /// trim) targets and the reserved `@` marker.
    pub fn add_env_alias(
        &self,
        provider: &str,
        name: &str,
        target: &str,
    ) -> Result<(), GatewayError> {
        let target = validate_target(target)?;
        self.primary
            .write()
            .entry(normalize(provider))
            .or_default()
            .insert(normalize(name), target);
        self.bump_generation();
        Ok(())
    }

    /// Bulk-load the fallback layer, e.g. from a config file's
    /// `[provider.<name>.fallback_aliases]` tables, or the package's
    /// auto-derived aliases (`top`, `top-cheap`, `top-longctx`).
    pub fn load_fallbacks<I>(&self, entries: I) -> Result<(), GatewayError>
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut fallback = self.fallback.write();
        for (provider, name, target) in entries {
            let target = validate_target(&target)?;
            fallback.entry(normalize(&provider)).or_default().insert(normalize(&name), target);
        }
        drop(fallback);
        self.bump_generation();
        Ok(())
    }

    pub fn lookup(&self, provider: &str, name: &str) -> Option<(String, AliasLayer)> {
        let provider = normalize(provider);
        let name = normalize(name);

        if let Some(target) = self.primary.read().get(&provider).and_then(|m| m.get(&name)) {
            return Some((target.clone(), AliasLayer::Primary));
        }
        self.fallback
            .read()
            .get(&provider)
            .and_then(|m| m.get(&name))
            .map(|target| (target.clone(), AliasLayer::Fallback))
    }

    /// Every primary alias, used by the substring-match stage when the
    /// search is not scoped to one provider. `(provider, alias, target)`.
    pub fn all_primary_candidates(&self) -> Vec<(String, String, String)> {
        self.primary
            .read()
            .iter()
            .flat_map(|(provider, aliases)| {
                aliases
                    .iter()
                    .map(move |(alias, target)| (provider.clone(), alias.clone(), target.clone()))
            })
            .collect()
    }

    pub fn primary_candidates_for(&self, provider: &str) -> Vec<(String, String)> {
        let provider = normalize(provider);
        self.primary
            .read()
            .get(&provider)
            .map(|m| m.iter().map(|(alias, target)| (alias.clone(), target.clone())).collect())
            .unwrap_or_default()
    }

    /// Snapshot of every primary alias, grouped by provider — used by the
    /// `GET /v1/aliases` endpoint.
    pub fn get_all(&self) -> HashMap<String, HashMap<String, String>> {
        self.primary.read().clone()
    }

    pub fn invalidate(&self) -> u64 {
        self.bump_generation()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

fn validate_target(target: &str) -> Result<String, GatewayError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Config("alias target cannot be empty".to_string()));
    }
    if trimmed.contains('@') {
        return Err(GatewayError::Config(format!(
            "alias target '{trimmed}' contains the reserved '@' marker"
        )));
    }
    Ok(trimmed.to_string())
}
