//! Configuration file resolution and TOML loading
//!
//! Config file lookup follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/tvmp/<file_name>`)
//! 4. No file: callers fall back to built-in defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve the configuration file path for a TVMP binary.
///
/// Returns `None` when no explicit path is given and no file exists in the
/// platform locations. A path given on the command line or via the
/// environment is returned even if it does not exist, so that loading it
/// reports a proper error instead of silently using defaults.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform locations
    platform_config_candidates(file_name)
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Candidate config locations for the current platform, most specific first
fn platform_config_candidates(file_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("tvmp").join(file_name));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/tvmp").join(file_name));
    }

    candidates
}

/// Load and parse a TOML file into `T`.
///
/// With `path == None` the type's `Default` is returned.
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No configuration file found, using built-in defaults");
        return Ok(T::default());
    };

    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let value = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(value)
}
