//! Tool-name sanitization and its inverse map.

use std::collections::HashMap;

/// Replace characters outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Maps sanitized tool names back to their original form, built while
/// converting a request and consulted while converting the matching
/// response or response stream.
#[derive(Debug, Clone, Default)]
pub struct ToolNameMap {
    inverse: HashMap<String, String>,
}

impl ToolNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `name` if `enabled`, recording the mapping when it changes
    /// the name. Returns the name to actually send upstream.
    pub fn record(&mut self, name: &str, enabled: bool) -> String {
        if !enabled {
            return name.to_string();
        }
        let sanitized = sanitize(name);
        if sanitized != name {
            self.inverse.insert(sanitized.clone(), name.to_string());
        }
        sanitized
    }

    /// Restore the original name, falling back to `name` itself when no
    /// mapping was recorded (no sanitization happened, or this is a fresh
    /// stream state machine that never saw the request side).
    pub fn restore<'a>(&'a self, name: &'a str) -> &'a str {
        self.inverse.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_disallowed_characters() {
        assert_eq!(sanitize("get.weather forecast"), "get_weather_forecast");
    }

    #[test]
    fn sanitize_preserves_allowed_characters() {
        assert_eq!(sanitize("get_weather-v2"), "get_weather-v2");
    }

    #[test]
    fn record_and_restore_round_trip() {
        let mut map = ToolNameMap::new();
        let sanitized = map.record("get.weather", true);
        assert_eq!(sanitized, "get_weather");
        assert_eq!(map.restore(&sanitized), "get.weather");
    }

    #[test]
    fn disabled_sanitization_is_a_no_op() {
        let mut map = ToolNameMap::new();
        let sanitized = map.record("get.weather", false);
        assert_eq!(sanitized, "get.weather");
        assert!(map.is_empty());
    }

    #[test]
    fn unmapped_name_restores_unchanged() {
        let map = ToolNameMap::new();
        assert_eq!(map.restore("untouched"), "untouched");
    }
}
