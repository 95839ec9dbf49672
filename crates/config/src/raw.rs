//! Flat key-value projection of every configuration layer: env vars, then
//! TOML file, then built-in defaults.
//!
//! `RawConfig` is deliberately dumb: a `HashMap<String, String>` with typed
//! accessors, built by folding four sources together with fixed precedence
//! (highest wins): process environment, project TOML, user TOML, package
//! defaults. Nothing here understands "provider" or "alias" — that
//! interpretation lives in `discovery.rs`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ConfigError;

const PROJECT_CONFIG_FILE: &str = "vandamme-config.toml";
const USER_CONFIG_SUBPATH: &str = "vandamme-proxy/vandamme-config.toml";

#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    map: HashMap<String, String>,
}

impl RawConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        self.get(key).and_then(|v| v.parse::<u64>().ok()).map(Duration::from_secs)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.parse::<u32>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
    }

    /// Comma-split list accessor, used for `{PROVIDER}_API_KEY`.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    /// Iterate every key that begins with `prefix`, stripped of the prefix.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.map.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix).map(|rest| (rest, v.as_str()))
        })
    }

    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|s| s.as_str())
    }

    fn insert(&mut self, key: String, value: String) {
        self.map.insert(key.to_ascii_uppercase(), value);
    }

    fn merge_lower_priority(&mut self, lower: HashMap<String, String>) {
        for (k, v) in lower {
            self.map.entry(k.to_ascii_uppercase()).or_insert(v);
        }
    }
}

/// Load the merged configuration view, highest layer wins.
pub fn load_raw_config() -> Result<RawConfig, ConfigError> {
    load_raw_config_from(
        Path::new(PROJECT_CONFIG_FILE),
        user_config_path().as_deref(),
    )
}

/// Testable variant taking explicit file paths instead of the real
/// `./vandamme-config.toml` / `~/.config/...` locations.
pub fn load_raw_config_from(
    project_path: &Path,
    user_path: Option<&Path>,
) -> Result<RawConfig, ConfigError> {
    let mut cfg = RawConfig::default();

    // Layer 1: process environment (highest precedence).
    for (k, v) in std::env::vars() {
        cfg.insert(k, v);
    }

    // Layer 2: project override.
    if let Some(layer) = load_toml_layer(project_path)? {
        cfg.merge_lower_priority(layer);
    }

    // Layer 3: user config.
    if let Some(user_path) = user_path {
        if let Some(layer) = load_toml_layer(user_path)? {
            cfg.merge_lower_priority(layer);
        }
    }

    // Layer 4: package defaults (embedded, lowest precedence).
    cfg.merge_lower_priority(package_defaults());

    Ok(cfg)
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(USER_CONFIG_SUBPATH))
}

/// Parse a TOML config file into the same flat key-value shape env vars use,
/// so merging is a single `HashMap` union regardless of origin.
///
/// Schema:
/// ```toml
/// [provider.<name>]
/// base_url = "..."
/// api_format = "openai"
/// api_keys = ["...", "..."]
/// custom_headers = { Name = "..." }
///
/// [provider.<name>.aliases]
/// <alias> = "<target>"
///
/// [provider.<name>.fallback_aliases]
/// <alias> = "<target>"
/// ```
fn load_toml_layer(path: &Path) -> Result<Option<HashMap<String, String>>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    let doc: toml::Value = text
        .parse()
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    let mut flat = HashMap::new();

    let Some(providers) = doc.get("provider").and_then(|v| v.as_table()) else {
        return Ok(Some(flat));
    };

    for (name, table) in providers {
        let prefix = name.to_ascii_uppercase();
        let Some(table) = table.as_table() else { continue };

        for (field, value) in table {
            match field.as_str() {
                "aliases" => {
                    if let Some(aliases) = value.as_table() {
                        for (alias, target) in aliases {
                            if let Some(target) = target.as_str() {
                                flat.insert(
                                    format!("{}_ALIAS_{}", prefix, alias.to_ascii_uppercase()),
                                    target.to_string(),
                                );
                            }
                        }
                    }
                }
                "fallback_aliases" => {
                    if let Some(aliases) = value.as_table() {
                        for (alias, target) in aliases {
                            if let Some(target) = target.as_str() {
                                flat.insert(
                                    format!("{}_FALLBACK_ALIAS_{}", prefix, alias.to_ascii_uppercase()),
                                    target.to_string(),
                                );
                            }
                        }
                    }
                }
                "custom_headers" => {
                    if let Some(headers) = value.as_table() {
                        for (header_name, header_value) in headers {
                            if let Some(header_value) = header_value.as_str() {
                                flat.insert(
                                    format!(
                                        "{}_CUSTOM_HEADER_{}",
                                        prefix,
                                        header_name.to_ascii_uppercase().replace('-', "_")
                                    ),
                                    header_value.to_string(),
                                );
                            }
                        }
                    }
                }
                "api_keys" => {
                    if let Some(keys) = value.as_array() {
                        let joined = keys
                            .iter()
                            .filter_map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(",");
                        flat.insert(format!("{}_API_KEY", prefix), joined);
                    }
                }
                other => {
                    let key = format!("{}_{}", prefix, other.to_ascii_uppercase());
                    let value_str = match value {
                        toml::Value::String(s) => s.clone(),
                        toml::Value::Integer(i) => i.to_string(),
                        toml::Value::Boolean(b) => b.to_string(),
                        _ => continue,
                    };
                    flat.insert(key, value_str);
                }
            }
        }
    }

    if let Some(default_provider) = doc.get("default_provider").and_then(|v| v.as_str()) {
        flat.insert("VDM_DEFAULT_PROVIDER".to_string(), default_provider.to_string());
    }

    Ok(Some(flat))
}

/// Package defaults embedded in the binary. Empty today — providers must be
/// explicitly configured — but this is the seam where a shipped
/// `defaults.toml` would be included via `include_str!`.
fn package_defaults() -> HashMap<String, String> {
    HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn env_wins_over_project_toml() {
        std::env::set_var("TESTPROV_BASE_URL", "http://from-env");
        let toml = write_toml(
            r#"
            [provider.testprov]
            base_url = "http://from-toml"
            "#,
        );
        let cfg = load_raw_config_from(toml.path(), None).unwrap();
        assert_eq!(cfg.get("TESTPROV_BASE_URL"), Some("http://from-env"));
        std::env::remove_var("TESTPROV_BASE_URL");
    }

    #[test]
    fn toml_api_keys_are_comma_joined() {
        let toml = write_toml(
            r#"
            [provider.poe]
            api_keys = ["k1", "k2"]
            "#,
        );
        let cfg = load_raw_config_from(toml.path(), None).unwrap();
        assert_eq!(cfg.get_list("POE_API_KEY"), Some(vec!["k1".into(), "k2".into()]));
    }

    #[test]
    fn toml_aliases_become_alias_keys() {
        let toml = write_toml(
            r#"
            [provider.openai.aliases]
            cheap = "poe:glm-4.6"
            "#,
        );
        let cfg = load_raw_config_from(toml.path(), None).unwrap();
        assert_eq!(cfg.get("OPENAI_ALIAS_CHEAP"), Some("poe:glm-4.6"));
    }

    #[test]
    fn custom_header_round_trips_through_flat_key() {
        let toml = write_toml(
            r#"
            [provider.openai]
            custom_headers = { X-Foo-Bar = "baz" }
            "#,
        );
        let cfg = load_raw_config_from(toml.path(), None).unwrap();
        assert_eq!(cfg.get("OPENAI_CUSTOM_HEADER_X_FOO_BAR"), Some("baz"));
    }
}
