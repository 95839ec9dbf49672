//! Application state shared across all handlers.
//!
//! Grounded on `voice-agent-server::state::AppState`: one `Clone` struct of
//! `Arc`-wrapped services built once at startup and handed to axum via
//! `.with_state(state)`. The services themselves own their own interior
//! mutability (dashmap/parking_lot) — `AppState` never needs a lock of its
//! own.

use std::sync::Arc;

use vandamme_aliases::{KnownProviders, ModelResolver};
use vandamme_providers::{ClientFactory, KeyRotator, ProviderRegistry};

/// Adapts [`ProviderRegistry`] to the [`KnownProviders`] seam `vandamme-aliases`
/// exposes, without giving `vandamme-providers` a dependency on
/// `vandamme-aliases` (or vice versa). Both stay siblings under `vandamme-core`.
pub struct RegistryKnownProviders<'a>(pub &'a ProviderRegistry);

impl KnownProviders for RegistryKnownProviders<'_> {
    fn is_configured(&self, name: &str) -> bool {
        self.0.exists(name)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub rotator: Arc<KeyRotator>,
    pub clients: Arc<ClientFactory>,
    pub resolver: Arc<ModelResolver>,
    /// `PROXY_API_KEY`: when `None`, inbound authentication is disabled
    ///.
    pub proxy_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        rotator: Arc<KeyRotator>,
        clients: Arc<ClientFactory>,
        resolver: Arc<ModelResolver>,
        proxy_api_key: Option<String>,
    ) -> Self {
        Self { registry, rotator, clients, resolver, proxy_api_key }
    }

    pub fn known_providers(&self) -> RegistryKnownProviders<'_> {
        RegistryKnownProviders(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_known_providers_delegates_to_exists() {
        let registry = ProviderRegistry::new();
        let cfg = vandamme_core::ProviderConfig::new(
            "openai",
            "https://api.openai.com",
            None,
            vandamme_core::ApiFormat::OpenAi,
            std::time::Duration::from_secs(30),
            2,
            false,
            Default::default(),
            vec!["sk-1".to_string()],
        )
        .unwrap();
        registry.register(cfg);
        let known = RegistryKnownProviders(&registry);
        assert!(known.is_configured("openai"));
        assert!(!known.is_configured("anthropic"));
    }
}
