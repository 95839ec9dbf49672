//! `AliasResolver` — chained resolution, substring matching and ranking.
//! Literal escape and provider-prefix parsing live in
//! [`crate::model_resolver`], which is the only caller of this module; both
//! stages share the same `AliasStore`.

use std::collections::HashSet;

use vandamme_core::ResolutionResult;

use crate::store::{normalize, AliasStore};

const MAX_CHAIN_LENGTH: usize = 16;

pub struct ResolveRequest<'a> {
    /// Model name with any provider prefix already stripped.
    pub rest: &'a str,
    /// Provider context: an explicit prefix, a caller hint, or the default.
    pub provider: &'a str,
    /// True only when `provider` came from an explicit `prov:model` prefix —
    /// substring matching is then scoped to that provider alone.
    pub provider_explicit: bool,
    pub default_provider: Option<&'a str>,
}

/// Resolve `request` against `store`. Never fails: an alias cycle or an
/// over-long chain returns the last resolved form with a logged warning,
/// locally recoverable and never surfaced to the caller.
pub fn resolve(store: &AliasStore, request: &ResolveRequest<'_>) -> (String, ResolutionResult) {
    if let Some(result) = chained_resolution(store, request) {
        return result;
    }
    substring_match(store, request)
}

fn chained_resolution(
    store: &AliasStore,
    request: &ResolveRequest<'_>,
) -> Option<(String, ResolutionResult)> {
    let mut provider = request.provider.to_string();
    let mut name = normalize(request.rest);
    let mut path = Vec::new();
    let mut visited = HashSet::new();

    let Some((first_target, _)) = store.lookup(&provider, &name) else {
        return None;
    };
    path.push(format!("{provider}:{name}"));

    let mut current_target = first_target;

    for _ in 0..MAX_CHAIN_LENGTH {
        // A `prov:sub` target always terminates the chain — the caller
        // validates `prov` is configured.
        if let Some((left, right)) = split_provider_prefix(&current_target) {
            return Some((
                left,
                ResolutionResult {
                    resolved_model: right,
                    was_resolved: true,
                    resolution_path: path,
                    best_match: Some(name),
                },
            ));
        }

        let key = (provider.clone(), normalize(&current_target));
        if !visited.insert(key) {
            tracing::warn!(provider, name = %current_target, "alias cycle detected, stopping chain");
            break;
        }

        match store.lookup(&provider, &current_target) {
            Some((next_target, _)) => {
                path.push(format!("{provider}:{}", normalize(&current_target)));
                name = normalize(&current_target);
                current_target = next_target;
            }
            None => {
                return Some((
                    provider.clone(),
                    ResolutionResult {
                        resolved_model: current_target,
                        was_resolved: true,
                        resolution_path: path,
                        best_match: Some(name),
                    },
                ));
            }
        }
    }

    tracing::warn!(provider, "alias chain exceeded {MAX_CHAIN_LENGTH} steps, returning last value");
    Some((
        provider.clone(),
        ResolutionResult {
            resolved_model: current_target,
            was_resolved: true,
            resolution_path: path,
            best_match: Some(name),
        },
    ))
}

struct Candidate {
    provider: String,
    alias: String,
    target: String,
    exact: bool,
}

fn substring_match(store: &AliasStore, request: &ResolveRequest<'_>) -> (String, ResolutionResult) {
    let haystack = normalize(request.rest);

    let pool: Vec<(String, String, String)> = if request.provider_explicit {
        store
            .primary_candidates_for(request.provider)
            .into_iter()
            .map(|(alias, target)| (request.provider.to_string(), alias, target))
            .collect()
    } else {
        store.all_primary_candidates()
    };

    let mut candidates: Vec<Candidate> = pool
        .into_iter()
        .filter(|(_, alias, _)| haystack.contains(alias.as_str()))
        .map(|(provider, alias, target)| {
            let exact = alias == haystack;
            Candidate { provider, alias, target, exact }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.exact
            .cmp(&a.exact)
            .then_with(|| b.alias.len().cmp(&a.alias.len()))
            .then_with(|| {
                let a_is_default = request.default_provider == Some(a.provider.as_str());
                let b_is_default = request.default_provider == Some(b.provider.as_str());
                b_is_default.cmp(&a_is_default)
            })
            .then_with(|| a.provider.cmp(&b.provider))
            .then_with(|| a.alias.cmp(&b.alias))
    });

    match candidates.into_iter().next() {
        Some(winner) => {
            let (provider, model) = match split_provider_prefix(&winner.target) {
                Some((left, right)) => (left, right),
                None => (winner.provider.clone(), winner.target.clone()),
            };
            (
                provider,
                ResolutionResult {
                    resolved_model: model,
                    was_resolved: true,
                    resolution_path: vec![format!("{}:{}", winner.provider, winner.alias)],
                    best_match: Some(winner.alias),
                },
            )
        }
        None => (
            request.provider.to_string(),
            ResolutionResult::unresolved(request.rest.to_string()),
        ),
    }
}

/// Split `prov:sub` into `(prov, sub)` if the left side looks like a
/// provider prefix (non-empty, no further colon).
fn split_provider_prefix(value: &str) -> Option<(String, String)> {
    let (left, right) = value.split_once(':')?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((normalize(left), right.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_alias_resolves_in_one_step() {
        let store = AliasStore::new();
        store.add_env_alias("poe", "haiku", "grok-4.1-fast").unwrap();
        let (provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "haiku", provider: "poe", provider_explicit: false, default_provider: Some("poe") },
        );
        assert_eq!(provider, "poe");
        assert_eq!(result.resolved_model, "grok-4.1-fast");
        assert!(result.was_resolved);
    }

    #[test]
    fn cross_provider_target_switches_provider() {
        let store = AliasStore::new();
        store.add_env_alias("openai", "cheap", "poe:glm-4.6").unwrap();
        let (provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "cheap", provider: "openai", provider_explicit: false, default_provider: Some("openai") },
        );
        assert_eq!(provider, "poe");
        assert_eq!(result.resolved_model, "glm-4.6");
    }

    #[test]
    fn chained_aliases_follow_through_to_terminal_value() {
        let store = AliasStore::new();
        store.add_env_alias("poe", "a", "b").unwrap();
        store.add_env_alias("poe", "b", "c-final").unwrap();
        let (provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "a", provider: "poe", provider_explicit: false, default_provider: None },
        );
        assert_eq!(provider, "poe");
        assert_eq!(result.resolved_model, "c-final");
        assert_eq!(result.resolution_path.len(), 2);
    }

    #[test]
    fn self_referencing_cycle_terminates() {
        let store = AliasStore::new();
        store.add_env_alias("poe", "a", "b").unwrap();
        store.add_env_alias("poe", "b", "a").unwrap();
        let (_provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "a", provider: "poe", provider_explicit: false, default_provider: None },
        );
        assert!(result.was_resolved);
    }

    #[test]
    fn substring_match_prefers_exact_over_longer_substring() {
        let store = AliasStore::new();
        store.add_env_alias("openai", "gpt4", "gpt-4-final").unwrap();
        store.add_env_alias("openai", "gpt4x", "wrong").unwrap();
        let (_provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "gpt4", provider: "openai", provider_explicit: false, default_provider: None },
        );
        assert_eq!(result.resolved_model, "gpt-4-final");
    }

    #[test]
    fn substring_match_prefers_longest_alias_on_non_exact_tie() {
        let store = AliasStore::new();
        store.add_env_alias("openai", "gpt", "short-hit").unwrap();
        store.add_env_alias("openai", "gpt-4", "long-hit").unwrap();
        let (_provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "gpt-4-turbo", provider: "openai", provider_explicit: false, default_provider: None },
        );
        assert_eq!(result.resolved_model, "long-hit");
    }

    #[test]
    fn no_match_returns_unresolved() {
        let store = AliasStore::new();
        let (_provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "nothing-matches", provider: "openai", provider_explicit: false, default_provider: None },
        );
        assert!(!result.was_resolved);
        assert_eq!(result.resolved_model, "nothing-matches");
    }

    #[test]
    fn explicit_provider_scopes_substring_search() {
        let store = AliasStore::new();
        store.add_env_alias("anthropic", "fast", "claude-haiku").unwrap();
        let (_provider, result) = resolve(
            &store,
            &ResolveRequest { rest: "fast", provider: "openai", provider_explicit: true, default_provider: None },
        );
        assert!(!result.was_resolved);
    }
}
