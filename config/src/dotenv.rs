//! Read the project `.env` into a key-value map. Applying to the process env happens in lib.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

/// `.env` inside `override_dir` if given, else inside the current directory.
fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Parses `.env` with the `dotenv` crate without touching the process environment.
/// A missing file yields an empty map; a malformed line fails the whole load.
pub fn load_env_map(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = dotenv_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let iter = ::dotenv::from_path_iter(&path).map_err(LoadError::Dotenv)?;
    let mut out = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(LoadError::Dotenv)?;
        out.insert(key, value);
    }
    Ok(out)
}
