// src/engine/mod.rs

//! Orchestration: job managers and the daemon that drives them.
//!
//! - [`manager`] swaps whole generations of watch/server jobs.
//! - [`daemon`] loads the config, applies it to both managers, reloads on
//!   config file changes and stops everything on shutdown.

pub mod daemon;
pub mod manager;

pub use daemon::Daemon;
pub use manager::{Manager, ServerManager, WatchManager};
