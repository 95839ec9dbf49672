//! HTTP gateway: route handlers, auth, orchestration, and the streaming
//! pipeline, built on top of `vandamme-core`/`vandamme-providers`/
//! `vandamme-aliases`/`vandamme-convert`.

pub mod auth;
pub mod error_mapper;
pub mod metrics;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod streaming;

pub use routes::create_router;
pub use state::AppState;
