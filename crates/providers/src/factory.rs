//! `ClientFactory` — caches one [`UpstreamClient`] per provider so the HTTP
//! client (and its connection pool) is built once, not per request.
//!
//! Grounded on `crates/llm/src/factory.rs::LlmFactory`'s role as the single
//! place that turns a provider config into something that can talk HTTP.

use dashmap::DashMap;
use vandamme_core::{GatewayError, ProviderConfig};

use crate::client::UpstreamClient;

#[derive(Default)]
pub struct ClientFactory {
    clients: DashMap<String, UpstreamClient>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_for(&self, provider: &ProviderConfig) -> Result<UpstreamClient, GatewayError> {
        if let Some(existing) = self.clients.get(&provider.name) {
            return Ok(existing.clone());
        }
        let client = UpstreamClient::build(provider)?;
        self.clients.insert(provider.name.clone(), client.clone());
        Ok(client)
    }

    /// Drop a cached client, e.g. when a provider's config changes on reload
    /// (timeout, base_url) and a stale `reqwest::Client` would be wrong.
    pub fn invalidate(&self, provider_name: &str) {
        self.clients.remove(provider_name);
    }
}
