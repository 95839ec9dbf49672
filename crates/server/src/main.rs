//! Vandamme proxy entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use vandamme_aliases::ModelResolver;
use vandamme_providers::{ClientFactory, KeyRotator, ProviderRegistry};
use vandamme_server::state::AppState;
use vandamme_server::{create_router, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting vandamme-proxy");

    let loaded = vandamme_config::load()?;

    let registry = Arc::new(ProviderRegistry::new());
    for provider in loaded.providers {
        registry.register(provider);
    }
    for (name, err) in &loaded.provider_errors {
        tracing::warn!(provider = %name, error = %err, "provider configuration rejected");
    }

    let resolver = Arc::new(ModelResolver::new());
    resolver.set_default_provider(loaded.default_provider.clone());
    for (provider, aliases) in &loaded.primary_aliases {
        for (alias, target) in aliases {
            resolver.store().add_env_alias(provider, alias, target)?;
        }
    }
    let fallback_entries = loaded.fallback_aliases.into_iter().flat_map(|(provider, aliases)| {
        aliases.into_iter().map(move |(alias, target)| (provider.clone(), alias, target))
    });
    resolver.store().load_fallbacks(fallback_entries)?;

    let proxy_api_key = std::env::var("PROXY_API_KEY").ok().filter(|k| !k.is_empty());
    if proxy_api_key.is_none() {
        tracing::warn!("PROXY_API_KEY is not set; gateway authentication is disabled");
    }

    let state = AppState::new(registry, Arc::new(KeyRotator::new()), Arc::new(ClientFactory::new()), resolver, proxy_api_key);

    let prometheus_handle = metrics::install();
    tracing::info!("metrics recorder installed, serving at /metrics");

    let app = create_router(state, prometheus_handle);

    let port: u16 = std::env::var("VDM_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn init_tracing() {
    let level = std::env::var("VDM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vandamme_server={level},vandamme_providers={level},tower_http=warn").into());

    let json = std::env::var("VDM_LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    let fmt_layer = if json { tracing_subscriber::fmt::layer().json().boxed() } else { tracing_subscriber::fmt::layer().boxed() };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}
