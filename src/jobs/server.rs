// src/jobs/server.rs

//! Server job: keep one long-lived command running.
//!
//! Each iteration of the run loop opens the log file, writes a start banner,
//! spawns the command (pty or pipes), copies its output into the log and the
//! daemon's streams, waits for exit and writes an exit banner. With
//! `restart = true` the loop waits the restart delay and goes again until the
//! job is closed.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, SecondsFormat};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ServerSpec;
use crate::config::spec::DEFAULT_RESTART_DELAY;
use crate::errors::{GhostError, Result};
use crate::exec::{self, LogTee, OutputMode, ProcessSpec, Spawned};
use crate::jobs::kill_switch::{KillTarget, ProcessSlot};
use crate::jobs::{JobContext, Supervised, exit_label, log_exit, wait_until_set};
use crate::logging::JobLogger;

/// How long output copies may keep draining after the process exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct ServerJob {
    shared: Arc<ServerShared>,
    stop: watch::Sender<bool>,
    loop_done: watch::Receiver<bool>,
}

#[derive(Debug)]
struct ServerShared {
    spec: ServerSpec,
    process: ProcessSpec,
    log: JobLogger,
    idle: watch::Sender<bool>,
    state: Mutex<ServerState>,
}

#[derive(Debug, Default)]
struct ServerState {
    closed: bool,
    slot: ProcessSlot,
}

impl ServerJob {
    /// Start the run loop. The first launch happens right away.
    pub fn start(spec: ServerSpec, ctx: &JobContext) -> Result<Self> {
        let log = ctx.logger(format!("ghost:server:{}", spec.name));

        let (stop, stop_rx) = watch::channel(false);
        let (done_tx, loop_done) = watch::channel(false);
        let (idle, _) = watch::channel(true);

        let shared = Arc::new(ServerShared {
            process: ProcessSpec::from(&spec),
            spec,
            log,
            idle,
            state: Mutex::new(ServerState::default()),
        });

        tokio::spawn(run_loop(Arc::clone(&shared), stop_rx, done_tx));

        Ok(Self {
            shared,
            stop,
            loop_done,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().slot.is_active()
    }

    /// Stop the job: no further launches, abort a pending restart delay,
    /// terminate the running process. Idempotent; every caller returns once
    /// the loop has exited and no process remains.
    pub async fn close(&self) {
        let first = {
            let mut state = self.shared.lock();
            if state.closed {
                false
            } else {
                state.closed = true;
                if state
                    .slot
                    .terminate(&self.shared, self.shared.spec.kill_timeout)
                    .is_some()
                {
                    self.shared.log.info("stopping process");
                }
                true
            }
        };
        if first {
            self.stop.send_replace(true);
        }

        wait_until_set(&mut self.loop_done.clone()).await;
        wait_until_set(&mut self.shared.idle.subscribe()).await;
    }
}

impl Supervised for ServerJob {
    type Spec = ServerSpec;

    const KIND: &'static str = "server";

    fn spec_name(spec: &ServerSpec) -> &str {
        &spec.name
    }

    fn start(spec: ServerSpec, ctx: &JobContext) -> Result<Self> {
        ServerJob::start(spec, ctx)
    }

    fn name(&self) -> &str {
        ServerJob::name(self)
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(ServerJob::close(self))
    }
}

async fn run_loop(
    shared: Arc<ServerShared>,
    mut stop_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
) {
    loop {
        if let Err(err) = shared.launch_once().await {
            if !shared.is_closed() {
                shared.log.error(format!("failed: {err}"));
            }
        }

        if shared.is_closed() || !shared.spec.restart {
            break;
        }

        let delay = if shared.spec.restart_delay.is_zero() {
            DEFAULT_RESTART_DELAY
        } else {
            shared.spec.restart_delay
        };
        tokio::select! {
            _ = wait_until_set(&mut stop_rx) => break,
            _ = tokio::time::sleep(delay) => {}
        }
        if shared.is_closed() {
            break;
        }
    }
    done_tx.send_replace(true);
}

fn banner(name: &str, what: &str) -> String {
    format!(
        "\n--- [{}] ghost server {name} {what} ---\n",
        Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

impl ServerShared {
    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// One launch: log file, banner, spawn, copy output, wait, exit banner.
    ///
    /// Errors are log file or spawn failures; process exit codes are logged
    /// here and are not errors.
    async fn launch_once(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        let tee = LogTee::open(&self.spec.log_path).await?;
        let start_banner = banner(
            &self.spec.name,
            &format!("starting: {}", self.spec.command_display),
        );
        tee.write_log(&start_banner)
            .await
            .map_err(|source| GhostError::LogFile {
                path: self.spec.log_path.clone(),
                source,
            })?;

        self.log
            .info(format!("starting {}", self.spec.command_display));

        let mode = if self.spec.pty {
            OutputMode::Pty
        } else {
            OutputMode::Piped
        };
        let Spawned { process, outputs } = exec::spawn(&self.process, mode)?;

        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let token = {
            let mut state = self.lock();
            let token = state.slot.register(control_tx);
            self.idle.send_replace(false);
            // Close ran between the check above and the registration.
            if state.closed {
                state.slot.terminate(self, self.spec.kill_timeout);
            }
            token
        };

        let pumps: Vec<JoinHandle<()>> = outputs
            .into_iter()
            .map(|stream| exec::pump(stream, tee.clone(), self.log.clone()))
            .collect();

        let result = process.supervise(&mut control_rx, &self.log).await;

        let closed = {
            let mut state = self.lock();
            state.slot.release(token);
            self.idle.send_replace(!state.slot.is_active());
            state.closed
        };

        drain(pumps).await;

        if closed {
            self.log.info(format!("stopped ({})", exit_label(&result)));
        } else {
            log_exit(&self.log, "exited", &result);
        }

        if let Err(err) = tee
            .write_log(&banner(&self.spec.name, &exit_label(&result)))
            .await
        {
            self.log.warn(format!("write exit banner: {err}"));
        }

        Ok(())
    }
}

/// Let output copies finish, then abort whatever is still blocked.
async fn drain(pumps: Vec<JoinHandle<()>>) {
    let deadline = Instant::now() + OUTPUT_DRAIN_GRACE;
    for mut pump in pumps {
        if tokio::time::timeout_at(deadline, &mut pump).await.is_err() {
            pump.abort();
        }
    }
}

impl KillTarget for ServerShared {
    fn kill_if_current(&self, token: u64) -> bool {
        let fired = self.lock().slot.kill_if_current(token);
        if fired {
            self.log.warn("forcing process exit with SIGKILL");
        }
        fired
    }
}
