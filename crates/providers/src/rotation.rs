//! Per-provider round-robin API key rotation.
//!
//! Grounded on `crates/llm/src/backend.rs::OllamaBackend`'s
//! `Arc<parking_lot::Mutex<Option<Vec<i64>>>>` session context: a small piece
//! of mutable state, guarded by a non-poisoning lock, read-then-advanced on
//! every call. Here the state is a cursor into a provider's key list instead
//! of a KV-cache context blob.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Round-robin cursor per provider name.
#[derive(Debug, Default)]
pub struct KeyRotator {
    cursors: Mutex<HashMap<String, usize>>,
}

impl KeyRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next key for `provider` out of `keys`, advancing the
    /// cursor. Returns `None` if `keys` is empty.
    pub fn next_key<'a>(&self, provider: &str, keys: &'a [String]) -> Option<&'a str> {
        if keys.is_empty() {
            return None;
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(provider.to_string()).or_insert(0);
        let key = &keys[*cursor % keys.len()];
        *cursor = (*cursor + 1) % keys.len();
        Some(key.as_str())
    }

    /// Drop a provider's cursor, e.g. when it is removed on reload.
    pub fn forget(&self, provider: &str) {
        self.cursors.lock().remove(provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_keys_in_order() {
        let rotator = KeyRotator::new();
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(rotator.next_key("p", &keys), Some("a"));
        assert_eq!(rotator.next_key("p", &keys), Some("b"));
        assert_eq!(rotator.next_key("p", &keys), Some("c"));
        assert_eq!(rotator.next_key("p", &keys), Some("a"));
    }

    #[test]
    fn separate_providers_have_independent_cursors() {
        let rotator = KeyRotator::new();
        let keys = vec!["a".to_string(), "b".to_string()];
        assert_eq!(rotator.next_key("p1", &keys), Some("a"));
        assert_eq!(rotator.next_key("p2", &keys), Some("a"));
        assert_eq!(rotator.next_key("p1", &keys), Some("b"));
    }

    #[test]
    fn empty_key_list_returns_none() {
        let rotator = KeyRotator::new();
        assert_eq!(rotator.next_key("p", &[]), None);
    }

    #[test]
    fn concurrent_calls_cover_every_key_exactly_once_per_cycle() {
        use std::sync::Arc;
        let rotator = Arc::new(KeyRotator::new());
        let keys: Vec<String> = (0..8).map(|i| i.to_string()).collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rotator = rotator.clone();
                let keys = keys.clone();
                std::thread::spawn(move || rotator.next_key("p", &keys).unwrap().to_string())
            })
            .collect();

        let mut seen: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort();
        let mut expected = keys;
        expected.sort();
        assert_eq!(seen, expected);
    }
}
