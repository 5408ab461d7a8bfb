// src/config/mod.rs

//! Configuration loading and normalisation.
//!
//! - [`model`] is the serde view of `ghost.toml`.
//! - [`validate`] turns it into [`spec`] structures the jobs consume.
//! - [`command`] and [`paths`] hold the command-line and path rules.

pub mod command;
pub mod loader;
pub mod model;
pub mod paths;
pub mod spec;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{DefaultsSection, RawConfigFile, RawServer, RawWatcher, StringOrList};
pub use paths::{default_config_path, resolve_path};
pub use spec::{GhostConfig, ServerSpec, WatchSpec};
