// src/logging.rs

//! Logging setup for `ghost` using `tracing` + `tracing-subscriber`, plus
//! the per-job log handle that every job receives at construction.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `GHOST_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout carries job output.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt as subscriber_fmt;

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("GHOST_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    subscriber_fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Destination for job lifecycle lines.
///
/// Jobs never log through a global; they get a sink through
/// [`crate::jobs::JobContext`], which lets tests capture exactly what a job
/// reported.
pub trait LogSink: Send + Sync + fmt::Debug {
    fn record(&self, level: Level, prefix: &str, message: &str);
}

/// Production sink: forwards every line to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, level: Level, prefix: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(job = %prefix, "{prefix} {message}"),
            Level::WARN => tracing::warn!(job = %prefix, "{prefix} {message}"),
            Level::INFO => tracing::info!(job = %prefix, "{prefix} {message}"),
            Level::DEBUG => tracing::debug!(job = %prefix, "{prefix} {message}"),
            _ => tracing::trace!(job = %prefix, "{prefix} {message}"),
        }
    }
}

/// A sink bound to one job prefix (`ghost:<name>`, `ghost:server:<name>`).
#[derive(Clone)]
pub struct JobLogger {
    sink: Arc<dyn LogSink>,
    prefix: Arc<str>,
}

impl fmt::Debug for JobLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLogger")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl JobLogger {
    pub fn new(sink: Arc<dyn LogSink>, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.sink.record(Level::INFO, &self.prefix, &message.to_string());
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.sink.record(Level::WARN, &self.prefix, &message.to_string());
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.sink.record(Level::ERROR, &self.prefix, &message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names_case_insensitively() {
        assert_eq!(parse_level_str(" Debug "), Some(Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }
}
