// src/engine/daemon.rs

//! Process-wide lifecycle: initial load, config hot-reload, shutdown.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::load_and_validate;
use crate::engine::manager::{ServerManager, WatchManager};
use crate::errors::{GhostError, Result};
use crate::jobs::{JobContext, wait_until_set};
use crate::watch::debounce::{Debouncer, sleep_until_deadline};

/// Quiet period after a config file change before reloading.
pub const CONFIG_DEBOUNCE: Duration = Duration::from_millis(150);

/// The daemon: both managers plus the config file watcher.
#[derive(Debug)]
pub struct Daemon {
    inner: Arc<DaemonInner>,
    config_watch: Mutex<Option<ConfigWatch>>,
}

#[derive(Debug)]
struct DaemonInner {
    config_path: PathBuf,
    watchers: WatchManager,
    servers: ServerManager,
    reload_lock: Mutex<()>,
}

impl Daemon {
    pub fn new(config_path: impl Into<PathBuf>, ctx: JobContext) -> Self {
        Self {
            inner: Arc::new(DaemonInner {
                config_path: config_path.into(),
                watchers: WatchManager::new(ctx.clone()),
                servers: ServerManager::new(ctx),
                reload_lock: Mutex::new(()),
            }),
            config_watch: Mutex::new(None),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.inner.config_path
    }

    pub fn watchers(&self) -> &WatchManager {
        &self.inner.watchers
    }

    pub fn servers(&self) -> &ServerManager {
        &self.inner.servers
    }

    /// Load the config, start every job, then watch the config file.
    pub async fn start(&self) -> Result<()> {
        let path = &self.inner.config_path;
        if !path.exists() {
            return Err(GhostError::config(format!(
                "config file not found at {}",
                path.display()
            )));
        }

        self.inner.reload().await?;

        let watch = ConfigWatch::start(Arc::clone(&self.inner))?;
        if let Some(previous) = self.config_watch.lock().await.replace(watch) {
            previous.stop().await;
        }

        info!(config = %path.display(), "ghost daemon started");
        Ok(())
    }

    /// Re-read the config and swap in the new generation of jobs.
    ///
    /// On error the previous generation keeps running.
    pub async fn reload(&self) -> Result<()> {
        self.inner.reload().await
    }

    /// Stop the config watcher, then every job.
    pub async fn stop(&self) {
        if let Some(watch) = self.config_watch.lock().await.take() {
            watch.stop().await;
        }
        self.inner.watchers.stop_all().await;
        self.inner.servers.stop_all().await;
        info!("ghost daemon stopped");
    }
}

impl DaemonInner {
    async fn reload(&self) -> Result<()> {
        let _guard = self.reload_lock.lock().await;
        let config = load_and_validate(&self.config_path)?;
        self.servers.apply(config.servers).await;
        self.watchers.apply(config.watchers).await;
        Ok(())
    }
}

/// Which notifications concern the config file.
#[derive(Debug, Clone)]
struct ConfigTargets {
    files: HashSet<PathBuf>,
    dirs: Vec<PathBuf>,
    base_name: Option<OsString>,
}

impl ConfigTargets {
    fn new(config_path: &Path) -> Self {
        let mut files = HashSet::new();
        let mut dirs = Vec::new();
        let mut add = |path: &Path| {
            files.insert(path.to_path_buf());
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !dirs.iter().any(|d| d == parent) {
                    dirs.push(parent.to_path_buf());
                }
            }
        };

        add(config_path);
        // Symlinked config: also watch where it points.
        if let Ok(resolved) = std::fs::canonicalize(config_path) {
            if resolved != config_path {
                add(&resolved);
            }
        }

        Self {
            files,
            dirs,
            base_name: config_path.file_name().map(OsString::from),
        }
    }

    fn should_reload(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        let remove_or_rename = matches!(
            event.kind,
            EventKind::Remove(_) | EventKind::Modify(notify::event::ModifyKind::Name(_))
        );
        event.paths.iter().any(|path| {
            self.files.contains(path)
                || (remove_or_rename && path.file_name() == self.base_name.as_deref())
        })
    }
}

/// Running config file watcher.
#[derive(Debug)]
struct ConfigWatch {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConfigWatch {
    fn start(inner: Arc<DaemonInner>) -> Result<Self> {
        let targets = ConfigTargets::new(&inner.config_path);
        let watch_err = |e: notify::Error| GhostError::Subscribe {
            root: inner.config_path.clone(),
            source: e.into(),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(watch_err)?;

        // The parent directory, not the file, so editor-style atomic saves
        // (write new + rename over) are seen.
        for dir in &targets.dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(watch_err)?;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_config_watcher(
            inner, watcher, event_rx, targets, stop_rx,
        ));
        Ok(Self { stop, task })
    }

    async fn stop(self) {
        self.stop.send_replace(true);
        let _ = self.task.await;
    }
}

async fn run_config_watcher(
    inner: Arc<DaemonInner>,
    _watcher: RecommendedWatcher,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    targets: ConfigTargets,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut debouncer: Debouncer<()> = Debouncer::new(CONFIG_DEBOUNCE);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            biased;

            _ = wait_until_set(&mut stop_rx) => break,

            event = events.recv() => match event {
                Some(Ok(event)) => {
                    if targets.should_reload(&event) {
                        debug!(paths = ?event.paths, "config change detected");
                        debouncer.push((), Instant::now());
                    }
                }
                Some(Err(err)) => error!("config watcher error: {err}"),
                None => break,
            },

            _ = sleep_until_deadline(deadline) => {
                debouncer.fire(Instant::now());
                if !debouncer.take().is_empty() {
                    match inner.reload().await {
                        Ok(()) => info!("reloaded config"),
                        Err(err) => error!("failed to reload config: {err}"),
                    }
                }
            }
        }
    }
}
