// src/lib.rs

//! `ghost`: a small supervisor daemon.
//!
//! Watch jobs rerun a command when files under a directory change; server
//! jobs keep long-lived commands alive and tee their output into a log
//! file. Both are declared in one TOML file that is hot-reloaded.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod jobs;
pub mod logging;
pub mod trigger;
pub mod watch;

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::{GhostConfig, default_config_path, load_and_validate, resolve_path};
use crate::engine::Daemon;
use crate::jobs::JobContext;

/// Main entrypoint used by `main.rs`.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config_path = config_path(&args)?;
    info!("using config {}", config_path.display());

    if args.dry_run {
        let config = load_and_validate(&config_path)
            .with_context(|| format!("load {}", config_path.display()))?;
        print_dry_run(&config);
        return Ok(());
    }

    let daemon = Daemon::new(config_path, JobContext::production());
    daemon.start().await?;

    shutdown_signal().await?;
    info!("shutting down");
    daemon.stop().await;
    Ok(())
}

fn config_path(args: &CliArgs) -> anyhow::Result<PathBuf> {
    let path = match args.config.as_deref() {
        Some(raw) => resolve_path(raw)?,
        None => default_config_path()?,
    };
    Ok(path)
}

fn print_dry_run(config: &GhostConfig) {
    println!("watchers ({}):", config.watchers.len());
    for w in &config.watchers {
        let mode = if w.restart { "restart" } else { "queue" };
        println!(
            "  {} [{mode}] {} -> {}",
            w.name,
            w.watch_root.display(),
            w.command_display
        );
    }
    println!("servers ({}):", config.servers.len());
    for s in &config.servers {
        println!(
            "  {} {} (log: {})",
            s.name,
            s.command_display,
            s.log_path.display()
        );
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("wait for Ctrl-C")?,
            _ = term.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("wait for Ctrl-C")?;
        Ok(())
    }
}
