// src/config.rs

//! Configuration loading utilities.
//!
//! Combines the TOML file, built-in defaults and environment overrides
//! into one validated [`Config`].

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Config {
    if path.exists() {
        Config::load_or_default(path)
    } else {
        log::debug!("No config file at {:?}; using defaults", path);
        Config::default()
    }
}

/// Load the file (if any), apply environment overrides and validate.
pub fn load_all(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_config(path),
        None => Config::default(),
    };
    config.apply_env();
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;
    Ok(config)
}
