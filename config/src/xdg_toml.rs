//! Load `$XDG_CONFIG_HOME/<app>/config.toml`: the `[env]` table plus the `[credentials]` table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

fn config_home() -> Result<PathBuf, LoadError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir().ok_or_else(|| LoadError::XdgPath("no config directory for this platform".to_string()))
}

fn config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let path = config_home()?.join(app_name).join("config.toml");
    Ok(path.exists().then_some(path))
}

/// `[credentials]` table. Keys are optional so a partial file still loads.
#[derive(Deserialize, Default, Debug)]
struct CredentialsSection {
    endpoint: Option<String>,
    api_token: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    credentials: CredentialsSection,
}

/// Env key prefix derived from the app name: `beacon` -> `BEACON`, `my-app` -> `MY_APP`.
pub(crate) fn env_prefix(app_name: &str) -> String {
    app_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Flattens the config file into env pairs. `[credentials]` becomes `<PREFIX>_ENDPOINT` and
/// `<PREFIX>_API_TOKEN`; an explicit `[env]` entry for the same key takes precedence.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = config_path(app_name)? else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let file: ConfigFile = toml::from_str(&content)?;

    let prefix = env_prefix(app_name);
    let mut out = file.env;
    if let Some(endpoint) = file.credentials.endpoint {
        out.entry(format!("{prefix}_ENDPOINT")).or_insert(endpoint);
    }
    if let Some(token) = file.credentials.api_token {
        out.entry(format!("{prefix}_API_TOKEN")).or_insert(token);
    }
    Ok(out)
}
