//! Layered configuration loading for the Vandamme gateway.
//!
//! Four layers, highest precedence first: process environment, project
//! `./vandamme-config.toml`, user `~/.config/vandamme-proxy/vandamme-config.toml`,
//! embedded package defaults. All four fold into one flat [`raw::RawConfig`]
//! before anything in this crate interprets a key as "provider" or "alias" —
//! see `raw.rs` for the merge and `discovery.rs` for the interpretation.
//!
//! This is hand-rolled rather than built on the `config` crate: the merge
//! unit here is a dynamic `{PROVIDER}_{FIELD}` grammar discovered at load
//! time, not a fixed `Deserialize` struct tree, so a generic layered-config
//! crate buys little over a `HashMap<String, String>` and a handful of typed
//! accessors.

mod discovery;
mod raw;

pub use discovery::{discover, LoadedConfig};
pub use raw::{load_raw_config, load_raw_config_from, RawConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file error: {0}")]
    FileNotFound(String),
    #[error("config parse error: {0}")]
    ParseError(String),
}

/// Load and interpret every configuration layer in one call — the entry
/// point `vandamme-server`'s startup and hot-reload paths use.
pub fn load() -> Result<LoadedConfig, ConfigError> {
    let raw = load_raw_config()?;
    discover(&raw)
}
