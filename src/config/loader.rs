// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::RawConfigFile;
use crate::config::spec::GhostConfig;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw model.
///
/// This only performs TOML deserialization; paths, commands and matchers are
/// resolved by [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and normalise it into job specs.
///
/// This is the entry point used by the daemon on start and on every reload.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GhostConfig> {
    let raw_config = load_from_path(&path)?;
    let config = GhostConfig::try_from(raw_config)?;
    Ok(config)
}
