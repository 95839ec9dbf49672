//! Provider registry, key rotation, and upstream HTTP clients.
//!
//! This crate knows how to reach a configured provider over HTTP; it does
//! not know the shape of an OpenAI or Anthropic request body — that
//! conversion lives in `vandamme-convert`, and request orchestration in
//! `vandamme-server`.

pub mod client;
pub mod factory;
pub mod registry;
pub mod rotation;

pub use client::UpstreamClient;
pub use factory::ClientFactory;
pub use registry::ProviderRegistry;
pub use rotation::KeyRotator;
