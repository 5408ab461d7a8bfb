// src/config/spec.rs

//! Normalised job specifications.
//!
//! These are what the job runtimes consume. They are produced by
//! [`crate::config::validate`] from the raw TOML model, already resolved
//! (absolute paths, non-empty command, compiled matchers) and never mutated
//! afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::trigger::EventKind;
use crate::watch::Matchers;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// A watch job: rerun `program args...` when files under `watch_root` change.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub name: String,
    pub watch_root: PathBuf,
    /// Basename of the watched file when the watcher targets one file.
    pub single_file: Option<String>,
    pub matchers: Matchers,
    pub events: BTreeSet<EventKind>,
    pub program: String,
    pub args: Vec<String>,
    pub command_display: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub restart: bool,
    pub run_on_start: bool,
    pub debounce: Duration,
    pub restart_delay: Duration,
    pub kill_timeout: Duration,
}

impl WatchSpec {
    pub fn allows(&self, event: EventKind) -> bool {
        self.events.contains(&event)
    }
}

/// A server job: keep `program args...` running, logging its output.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub command_display: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub restart: bool,
    pub restart_delay: Duration,
    pub kill_timeout: Duration,
    pub pty: bool,
    pub log_path: PathBuf,
}

/// Everything the daemon applies on (re)load.
#[derive(Debug, Clone, Default)]
pub struct GhostConfig {
    pub watchers: Vec<WatchSpec>,
    pub servers: Vec<ServerSpec>,
}
