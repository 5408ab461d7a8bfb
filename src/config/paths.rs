// src/config/paths.rs

//! Path resolution rules shared by the loader and the normaliser.

use std::path::{Component, Path, PathBuf};

use crate::errors::{GhostError, Result};

pub const CONFIG_ENV_VAR: &str = "GHOST_CONFIG";

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| GhostError::config("could not resolve home directory"))
}

/// Resolve a user-supplied path.
///
/// - `~` and `~/x` expand to the home directory.
/// - Absolute paths are cleaned.
/// - Relative paths are taken relative to the home directory.
pub fn resolve_path(input: &str) -> Result<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GhostError::config("path must not be empty"));
    }
    if input == "~" {
        return Ok(clean(&home_dir()?));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return Ok(clean(&home_dir()?.join(rest)));
    }

    let path = Path::new(input);
    if path.is_absolute() {
        return Ok(clean(path));
    }
    Ok(clean(&home_dir()?.join(path)))
}

/// Lexically normalise `.` and `..` components.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Config location: `$GHOST_CONFIG` if set, else `~/.config/ghost/ghost.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => resolve_path(&value),
        _ => Ok(home_dir()?.join(".config").join("ghost").join("ghost.toml")),
    }
}

/// `~/.local/state/ghost/servers/<sanitised name>.log`.
pub fn default_server_log_path(name: &str) -> Result<PathBuf> {
    let mut base = sanitize_filename(name);
    if base.is_empty() {
        base = "server".to_string();
    }
    Ok(home_dir()?
        .join(".local")
        .join("state")
        .join("ghost")
        .join("servers")
        .join(format!("{base}.log")))
}

/// Lowercase a name into something safe to use as a file name.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;

    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
            last_dash = false;
        } else if c == '-' || c == '_' {
            out.push(c);
            last_dash = c == '-';
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches(|c| c == '-' || c == '_').to_string()
}
