// src/jobs/watch.rs

//! Watch job: rerun a command when files under a root change.
//!
//! Flow: raw notification -> admission ([`triggers_for_event`]) -> debounce
//! -> dedupe -> [`WatchShared::schedule`] -> launch or terminate.
//!
//! Two policies decide what happens when triggers arrive while the command is
//! still running:
//!
//! - restart mode: ask the running process to stop, then relaunch with every
//!   trigger accumulated meanwhile. Further triggers coalesce into the same
//!   pending restart without another signal.
//! - queue mode: never interrupt; start one more run after the current one
//!   exits.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::config::WatchSpec;
use crate::errors::Result;
use crate::exec::{self, ExitReport, OutputMode, ProcessSpec};
use crate::jobs::kill_switch::{KillTarget, ProcessSlot};
use crate::jobs::{JobContext, Supervised, log_exit, wait_until_set};
use crate::logging::JobLogger;
use crate::trigger::{Trigger, dedupe_triggers, format_triggers};
use crate::watch::debounce::{Debouncer, sleep_until_deadline};
use crate::watch::{Subscription, WatchRoot, triggers_for_event};

/// A running watch job. Dropping it without [`WatchJob::close`] stops the
/// event loop but leaves a running process alone.
#[derive(Debug)]
pub struct WatchJob {
    shared: Arc<WatchShared>,
    stop: watch::Sender<bool>,
    loop_done: watch::Receiver<bool>,
}

#[derive(Debug)]
struct WatchShared {
    spec: WatchSpec,
    process: ProcessSpec,
    log: JobLogger,
    /// True whenever no process is registered.
    idle: watch::Sender<bool>,
    state: Mutex<WatchState>,
}

#[derive(Debug, Default)]
struct WatchState {
    closed: bool,
    slot: ProcessSlot,
    /// A termination was already sent for the current run.
    restart_requested: bool,
    restart_queue: Vec<Trigger>,
    run_queue: Vec<Trigger>,
}

impl WatchJob {
    /// Subscribe to the watch root and start the event loop.
    ///
    /// Subscription failure is returned and the job never starts.
    pub fn start(spec: WatchSpec, ctx: &JobContext) -> Result<Self> {
        let subscription = ctx.events.subscribe(&spec.watch_root)?;
        let log = ctx.logger(format!("ghost:{}", spec.name));

        let (stop, stop_rx) = watch::channel(false);
        let (done_tx, loop_done) = watch::channel(false);
        let (idle, _) = watch::channel(true);

        let shared = Arc::new(WatchShared {
            process: ProcessSpec::from(&spec),
            spec,
            log,
            idle,
            state: Mutex::new(WatchState::default()),
        });

        shared.log.info(format!(
            "watching {} ({})",
            shared.spec.watch_root.display(),
            describe_filter(&shared.spec)
        ));

        tokio::spawn(run_loop(
            Arc::clone(&shared),
            subscription,
            stop_rx,
            done_tx,
        ));

        if shared.spec.run_on_start {
            shared.schedule(vec![Trigger::startup()]);
        }

        Ok(Self {
            shared,
            stop,
            loop_done,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    /// Whether a process is currently registered.
    pub fn is_running(&self) -> bool {
        self.shared.lock().slot.is_active()
    }

    /// Stop the job.
    ///
    /// The first call marks the job closed, discards all queues, stops the
    /// event loop (which unsubscribes) and asks a running process to
    /// terminate. Every call, concurrent or later, returns only once the loop
    /// has exited and no process remains.
    pub async fn close(&self) {
        let first = {
            let mut state = self.shared.lock();
            if state.closed {
                false
            } else {
                state.closed = true;
                state.restart_requested = false;
                state.restart_queue.clear();
                state.run_queue.clear();
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

impl Supervised for WatchJob {
    type Spec = WatchSpec;

    const KIND: &'static str = "watcher";

    fn spec_name(spec: &WatchSpec) -> &str {
        &spec.name
    }

    fn start(spec: WatchSpec, ctx: &JobContext) -> Result<Self> {
        WatchJob::start(spec, ctx)
    }

    fn name(&self) -> &str {
        WatchJob::name(self)
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(WatchJob::close(self))
    }
}

fn describe_filter(spec: &WatchSpec) -> String {
    let events: Vec<&str> = spec.events.iter().map(|e| e.as_str()).collect();
    if spec.matchers.is_empty() {
        format!("all paths, events: {}", events.join(","))
    } else {
        format!(
            "match: {}, events: {}",
            spec.matchers.patterns().join(","),
            events.join(",")
        )
    }
}

async fn run_loop(
    shared: Arc<WatchShared>,
    mut subscription: Subscription,
    mut stop_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
) {
    let root = WatchRoot::new(&shared.spec.watch_root);
    let mut debouncer: Debouncer<Trigger> = Debouncer::new(shared.spec.debounce);

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            biased;

            _ = wait_until_set(&mut stop_rx) => break,

            item = subscription.recv() => match item {
                Some(Ok(raw)) => {
                    let now = Instant::now();
                    for trigger in triggers_for_event(&shared.spec, &root, &raw) {
                        debouncer.push(trigger, now);
                    }
                }
                Some(Err(err)) => {
                    shared.log.error(format!("watch error: {err}"));
                    break;
                }
                None => {
                    shared.log.warn("event source closed");
                    break;
                }
            },

            _ = sleep_until_deadline(deadline) => {
                debouncer.fire(Instant::now());
                let batch = dedupe_triggers(debouncer.take());
                if !batch.is_empty() {
                    shared.schedule(batch);
                }
            }
        }
    }

    debouncer.reset();
    drop(subscription);
    done_tx.send_replace(true);
}

impl WatchShared {
    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(self: &Arc<Self>, triggers: Vec<Trigger>) {
        let triggers = if triggers.is_empty() {
            vec![Trigger::manual()]
        } else {
            triggers
        };

        let mut state = self.lock();
        if state.closed {
            return;
        }

        if self.spec.restart {
            state.restart_queue.extend(triggers.iter().cloned());
            if state.slot.is_active() {
                if state.restart_requested {
                    self.log
                        .info(format!("coalesced restart [{}]", format_triggers(&triggers)));
                } else {
                    state.restart_requested = true;
                    self.log
                        .info(format!("restart requested [{}]", format_triggers(&triggers)));
                    state.slot.terminate(self, self.spec.kill_timeout);
                }
                return;
            }
            let queued = dedupe_triggers(std::mem::take(&mut state.restart_queue));
            self.launch(&mut state, queued);
            return;
        }

        if state.slot.is_active() {
            self.log
                .info(format!("queued run [{}]", format_triggers(&triggers)));
            state.run_queue.extend(triggers);
            return;
        }

        self.launch(&mut state, triggers);
    }

    /// Spawn the command. Called with the state lock held.
    fn launch(self: &Arc<Self>, state: &mut WatchState, triggers: Vec<Trigger>) {
        let triggers = if triggers.is_empty() {
            vec![Trigger::manual()]
        } else {
            triggers
        };

        self.log.info(format!(
            "starting {} [{}]",
            self.spec.command_display,
            format_triggers(&triggers)
        ));

        let spawned = match exec::spawn(&self.process, OutputMode::Inherit) {
            Ok(spawned) => spawned,
            Err(err) => {
                self.log.error(format!("failed to start command: {err}"));
                return;
            }
        };

        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let token = state.slot.register(control_tx);
        self.idle.send_replace(false);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = spawned.process.supervise(&mut control_rx, &shared.log).await;
            shared.on_exit(token, result);
        });
    }

    fn on_exit(self: &Arc<Self>, token: u64, result: io::Result<ExitReport>) {
        let next = {
            let mut state = self.lock();
            state.slot.release(token);
            self.idle.send_replace(!state.slot.is_active());

            let restart_requested = std::mem::take(&mut state.restart_requested);
            let restart_queue = std::mem::take(&mut state.restart_queue);
            let run_queue = std::mem::take(&mut state.run_queue);

            if state.closed {
                None
            } else if self.spec.restart {
                if !restart_queue.is_empty() {
                    Some(dedupe_triggers(restart_queue))
                } else if restart_requested || self.spec.run_on_start {
                    Some(vec![Trigger::restart()])
                } else {
                    None
                }
            } else if !run_queue.is_empty() {
                Some(dedupe_triggers(run_queue))
            } else {
                None
            }
        };

        log_exit(&self.log, "process exited", &result);

        if let Some(triggers) = next {
            self.schedule(triggers);
        }
    }
}

impl KillTarget for WatchShared {
    fn kill_if_current(&self, token: u64) -> bool {
        let fired = self.lock().slot.kill_if_current(token);
        if fired {
            self.log.warn("forcing process exit with SIGKILL");
        }
        fired
    }
}
