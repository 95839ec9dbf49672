//! Types shared by the alias-resolution pipeline (`vandamme-aliases`) and its
//! callers (`vandamme-server::orchestrator`).

use serde::Serialize;

/// Immutable record of one model-name resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    pub resolved_model: String,
    pub was_resolved: bool,
    pub resolution_path: Vec<String>,
    pub best_match: Option<String>,
}

impl ResolutionResult {
    pub fn unresolved(model: impl Into<String>) -> Self {
        Self {
            resolved_model: model.into(),
            was_resolved: false,
            resolution_path: Vec::new(),
            best_match: None,
        }
    }
}

/// The final `(provider, model)` pair a request is dispatched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub provider: String,
    pub model: String,
}
