// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [defaults]
/// debounce_ms = 150
///
/// [[watchers]]
/// name = "tests"
/// path = "~/src/app"
/// command = "cargo test"
/// match = ["**/*.rs"]
///
/// [[servers]]
/// name = "api"
/// command = ["npm", "run", "dev"]
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    #[serde(default)]
    pub watchers: Vec<RawWatcher>,

    #[serde(default)]
    pub servers: Vec<RawServer>,
}

/// `[defaults]` section: fallbacks for per-job timing and events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsSection {
    pub debounce_ms: Option<i64>,
    pub restart_delay_ms: Option<i64>,
    pub kill_timeout_ms: Option<i64>,
    #[serde(default)]
    pub events: Vec<String>,
}

/// A value that may be written as a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// `[[watchers]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWatcher {
    #[serde(default)]
    pub name: String,

    /// File or directory to watch. `directory` wins when both are set.
    pub path: Option<String>,
    pub directory: Option<String>,

    /// Program (string is split shell-style) or argv array.
    pub command: Option<StringOrList>,
    pub args: Option<StringOrList>,
    pub cwd: Option<String>,

    /// Environment overrides; scalar values are stringified.
    #[serde(default)]
    pub env: BTreeMap<String, toml::Value>,

    /// Glob matchers; `match` and `matches` are concatenated.
    #[serde(rename = "match")]
    pub match_: Option<StringOrList>,
    pub matches: Option<StringOrList>,

    #[serde(default)]
    pub events: Vec<String>,

    pub restart: Option<bool>,
    pub run_on_start: Option<bool>,
    pub debounce_ms: Option<i64>,
    pub restart_delay_ms: Option<i64>,
    pub kill_timeout_ms: Option<i64>,
    pub shell: Option<bool>,
}

/// `[[servers]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServer {
    #[serde(default)]
    pub name: String,
    pub command: Option<StringOrList>,
    pub args: Option<StringOrList>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, toml::Value>,
    pub restart: Option<bool>,
    pub restart_delay_ms: Option<i64>,
    pub kill_timeout_ms: Option<i64>,
    pub shell: Option<bool>,
    pub log_path: Option<String>,
    pub pty: Option<bool>,
}
