//! Load configuration from XDG `config.toml` and project `.env`, then apply it to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! The XDG file may also hold the credential pair used by `beacon send`:
//!
//! ```toml
//! [credentials]
//! endpoint = "https://api.example.com"
//! api_token = "..."
//! ```
//!
//! which is exposed as `BEACON_ENDPOINT` / `BEACON_API_TOKEN`.

mod dotenv;
mod xdg_toml;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(::dotenv::Error),
}

/// Merges the two file sources: `.env` wins over XDG for keys present in both.
fn merge_sources(
    dotenv_map: HashMap<String, String>,
    xdg_map: HashMap<String, String>,
) -> HashMap<String, String> {
    let keys: HashSet<&String> = dotenv_map.keys().chain(xdg_map.keys()).collect();
    keys.into_iter()
        .filter_map(|k| {
            dotenv_map
                .get(k)
                .or_else(|| xdg_map.get(k))
                .map(|v| (k.clone(), v.clone()))
        })
        .collect()
}

/// Loads the XDG config and optional project `.env`, then sets environment variables only for
/// keys that are **not** already set.
///
/// * `app_name`: e.g. `"beacon"`; selects `~/.config/<app_name>/config.toml` and the
///   `<APP>_` prefix of the credential keys.
/// * `override_dir`: look for `.env` here instead of the current directory.
///
/// Returns the keys that were applied (sorted), which callers may log.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<Vec<String>, LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir)?;

    let mut applied = Vec::new();
    for (key, value) in merge_sources(dotenv_map, xdg_map) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied.push(key);
    }
    applied.sort();
    Ok(applied)
}

/// Reads a boolean flag from the environment: `1`, `true`, `yes` (any case) are true.
pub fn env_flag(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
