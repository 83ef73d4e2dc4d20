//! Access code configuration loading from config.toml
//!
//! The codes listed in the seed file are inserted into the Access Gate at
//! startup. Missing seed files are not an error; a deployment may manage its
//! codes directly in the database instead.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Access gate section
    #[serde(default)]
    pub access: AccessSection,
}

/// The `[access]` table of the seed file
#[derive(Debug, Default, Deserialize)]
pub struct AccessSection {
    /// Shared codes that elevate a session
    #[serde(default)]
    pub codes: Vec<String>,
}

/// Loads access code configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No access code seed file found");
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}
