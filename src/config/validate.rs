// src/config/validate.rs

//! Normalise the raw TOML model into [`GhostConfig`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::command::{parse_command_spec, resolve_invocation};
use crate::config::model::{DefaultsSection, RawConfigFile, RawServer, RawWatcher, StringOrList};
use crate::config::paths::{default_server_log_path, resolve_path};
use crate::config::spec::{
    DEFAULT_DEBOUNCE, DEFAULT_KILL_TIMEOUT, DEFAULT_RESTART_DELAY, GhostConfig, ServerSpec,
    WatchSpec,
};
use crate::errors::{GhostError, Result};
use crate::trigger::EventKind;
use crate::watch::Matchers;

impl TryFrom<RawConfigFile> for GhostConfig {
    type Error = GhostError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if raw.watchers.is_empty() {
            info!("config contains no watchers");
        }

        let watchers = raw
            .watchers
            .iter()
            .enumerate()
            .map(|(i, w)| {
                normalize_watcher(w, i, &raw.defaults)
                    .map_err(|e| GhostError::config(format!("watchers[{i}]: {}", detail(e))))
            })
            .collect::<Result<Vec<_>>>()?;

        let servers = raw
            .servers
            .iter()
            .enumerate()
            .map(|(i, s)| {
                normalize_server(s, i, &raw.defaults)
                    .map_err(|e| GhostError::config(format!("servers[{i}]: {}", detail(e))))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GhostConfig { watchers, servers })
    }
}

fn detail(err: GhostError) -> String {
    match err {
        GhostError::ConfigError(msg) => msg,
        other => other.to_string(),
    }
}

fn normalize_watcher(raw: &RawWatcher, index: usize, defaults: &DefaultsSection) -> Result<WatchSpec> {
    let name = default_name(&raw.name, "watcher", index);

    let path_value = non_blank(raw.directory.as_deref())
        .or_else(|| non_blank(raw.path.as_deref()))
        .ok_or_else(|| GhostError::config("\"path\" must be provided"))?;
    let resolved = resolve_path(path_value)?;
    let metadata = std::fs::metadata(&resolved)
        .map_err(|e| GhostError::config(format!("{}: {e}", resolved.display())))?;

    let (watch_root, single_file) = if metadata.is_dir() {
        (resolved, None)
    } else {
        let root = resolved
            .parent()
            .map(PathBuf::from)
            .ok_or_else(|| GhostError::config("resolved root is empty"))?;
        let file = resolved
            .file_name()
            .map(|f| f.to_string_lossy().into_owned());
        (root, file)
    };
    if !watch_root.is_dir() {
        return Err(GhostError::config(format!(
            "watch root {} is not a directory",
            watch_root.display()
        )));
    }

    let parts = parse_command_spec(raw.command.as_ref(), raw.args.as_ref())?;
    let (program, args, command_display) =
        resolve_invocation(parts, raw.shell.unwrap_or(false))?;

    let env = normalize_env(&raw.env)?;

    let cwd = match non_blank(raw.cwd.as_deref()) {
        Some(cwd) => resolve_path(cwd)?,
        None => watch_root.clone(),
    };

    let mut patterns = list(raw.match_.as_ref());
    patterns.extend(list(raw.matches.as_ref()));
    let matchers = Matchers::for_watcher(&patterns, single_file.as_deref())
        .map_err(|e| GhostError::config(format!("{e:#}")))?;

    let restart = raw.restart.unwrap_or(false);
    let run_on_start = raw.run_on_start.unwrap_or(restart);

    Ok(WatchSpec {
        name,
        watch_root,
        single_file,
        matchers,
        events: normalize_events(&raw.events, &defaults.events, restart),
        program,
        args,
        command_display,
        cwd,
        env,
        restart,
        run_on_start,
        debounce: choose_duration(raw.debounce_ms, defaults.debounce_ms, DEFAULT_DEBOUNCE),
        restart_delay: choose_duration(
            raw.restart_delay_ms,
            defaults.restart_delay_ms,
            DEFAULT_RESTART_DELAY,
        ),
        kill_timeout: choose_duration(
            raw.kill_timeout_ms,
            defaults.kill_timeout_ms,
            DEFAULT_KILL_TIMEOUT,
        ),
    })
}

fn normalize_server(raw: &RawServer, index: usize, defaults: &DefaultsSection) -> Result<ServerSpec> {
    let name = default_name(&raw.name, "server", index);

    let parts = parse_command_spec(raw.command.as_ref(), raw.args.as_ref())?;
    let (program, args, command_display) =
        resolve_invocation(parts, raw.shell.unwrap_or(false))?;

    let env = normalize_env(&raw.env)?;

    let cwd = match non_blank(raw.cwd.as_deref()) {
        Some(cwd) => resolve_path(cwd)?,
        None => std::env::current_dir()
            .map_err(|e| GhostError::config(format!("resolve working directory: {e}")))?,
    };

    let log_path = match non_blank(raw.log_path.as_deref()) {
        Some(path) => resolve_path(path)?,
        None => default_server_log_path(&name)?,
    };

    Ok(ServerSpec {
        name,
        program,
        args,
        command_display,
        cwd,
        env,
        restart: raw.restart.unwrap_or(true),
        restart_delay: choose_duration(
            raw.restart_delay_ms,
            defaults.restart_delay_ms,
            DEFAULT_RESTART_DELAY,
        ),
        kill_timeout: choose_duration(
            raw.kill_timeout_ms,
            defaults.kill_timeout_ms,
            DEFAULT_KILL_TIMEOUT,
        ),
        pty: raw.pty.unwrap_or(true),
        log_path,
    })
}

fn default_name(name: &str, kind: &str, index: usize) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("{kind}-{}", index + 1)
    } else {
        name.to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn list(value: Option<&StringOrList>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(StringOrList::One(s)) => vec![s.clone()],
        Some(StringOrList::Many(items)) => items.clone(),
    }
}

fn normalize_env(env: &BTreeMap<String, toml::Value>) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (key, value) in env {
        if key.is_empty() {
            continue;
        }
        let value = match value {
            toml::Value::String(s) => s.trim().to_string(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                return Err(GhostError::config(format!(
                    "invalid env: environment value for {key} must be string"
                )));
            }
        };
        out.insert(key.clone(), value);
    }
    Ok(out)
}

/// Effective event set: watcher list, else `[defaults].events`, else all
/// filesystem kinds for restart watchers and `change` otherwise.
fn normalize_events(events: &[String], defaults: &[String], restart: bool) -> BTreeSet<EventKind> {
    let source: Vec<&str> = if !events.is_empty() {
        events.iter().map(String::as_str).collect()
    } else if !defaults.is_empty() {
        defaults.iter().map(String::as_str).collect()
    } else if restart {
        EventKind::FILESYSTEM.iter().map(|k| k.as_str()).collect()
    } else {
        vec![EventKind::Change.as_str()]
    };

    let mut out = BTreeSet::new();
    for name in source {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match name.parse::<EventKind>() {
            Ok(kind) if !kind.is_synthetic() => {
                out.insert(kind);
            }
            _ => warn!("ignoring unsupported event {name:?}"),
        }
    }
    out
}

fn choose_duration(value: Option<i64>, fallback: Option<i64>, default: Duration) -> Duration {
    match value.or(fallback) {
        Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
        Some(_) => Duration::ZERO,
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_default_by_restart_mode() {
        let plain = normalize_events(&[], &[], false);
        assert_eq!(plain.into_iter().collect::<Vec<_>>(), vec![EventKind::Change]);

        let restart = normalize_events(&[], &[], true);
        assert_eq!(restart.len(), 7);
    }

    #[test]
    fn unsupported_and_synthetic_events_are_ignored() {
        let events = vec!["change".to_string(), "bogus".into(), "startup".into()];
        let set = normalize_events(&events, &[], false);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![EventKind::Change]);
    }

    #[test]
    fn durations_prefer_job_then_defaults() {
        let d = Duration::from_millis(150);
        assert_eq!(choose_duration(Some(50), Some(75), d), Duration::from_millis(50));
        assert_eq!(choose_duration(None, Some(75), d), Duration::from_millis(75));
        assert_eq!(choose_duration(None, None, d), d);
        assert_eq!(choose_duration(Some(-1), None, d), Duration::ZERO);
    }

    #[test]
    fn env_values_are_stringified() -> Result<()> {
        let mut env = BTreeMap::new();
        env.insert("PORT".to_string(), toml::Value::Integer(8080));
        env.insert("DEBUG".to_string(), toml::Value::Boolean(true));
        let out = normalize_env(&env)?;
        assert_eq!(out["PORT"], "8080");
        assert_eq!(out["DEBUG"], "true");

        env.insert("BAD".to_string(), toml::Value::Array(vec![]));
        assert!(normalize_env(&env).is_err());
        Ok(())
    }
}
