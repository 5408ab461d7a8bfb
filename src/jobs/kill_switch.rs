// src/jobs/kill_switch.rs

//! The per-job process slot and its race-safe forced-kill timer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::exec::Control;

/// Something that can force-kill "the process named by `token`", checking
/// under its own lock that the token is still the active one.
pub trait KillTarget: Send + Sync + 'static {
    /// Returns true if a kill was actually sent.
    fn kill_if_current(&self, token: u64) -> bool;
}

/// One-shot forced-kill timer.
///
/// Armed with the generation token of the process it is meant for. Arming
/// again aborts the previous timer. When it fires it only asks the target to
/// kill that token, so a process that exited (and whose slot may since have
/// been reused) is never touched.
#[derive(Debug, Default)]
pub struct KillSwitch {
    timer: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    token: u64,
    handle: JoinHandle<()>,
}

impl KillSwitch {
    pub fn arm<T: KillTarget>(&mut self, target: &Arc<T>, token: u64, after: Duration) {
        self.disarm();
        let target: Weak<T> = Arc::downgrade(target);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(target) = target.upgrade() {
                target.kill_if_current(token);
            }
        });
        self.timer = Some(ArmedTimer { token, handle });
    }

    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// Whether a pending timer is already counting down for `token`.
    pub fn is_armed_for(&self, token: u64) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|t| t.token == token && !t.handle.is_finished())
    }
}

#[derive(Debug)]
struct ActiveProcess {
    token: u64,
    control: mpsc::UnboundedSender<Control>,
}

/// The "at most one live process" slot of a job.
///
/// Every registered process gets a fresh generation token; all later
/// operations name the token they mean.
#[derive(Debug, Default)]
pub struct ProcessSlot {
    next_token: u64,
    active: Option<ActiveProcess>,
    kill: KillSwitch,
}

impl ProcessSlot {
    /// Record a newly spawned process. Returns its token.
    pub fn register(&mut self, control: mpsc::UnboundedSender<Control>) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.kill.disarm();
        self.active = Some(ActiveProcess { token, control });
        token
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Clear the slot after `token` exited. Always disarms the kill timer.
    ///
    /// Returns false when a different process is registered (left alone).
    pub fn release(&mut self, token: u64) -> bool {
        self.kill.disarm();
        match &self.active {
            Some(active) if active.token == token => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Ask the active process to stop gracefully and arm the forced kill.
    ///
    /// A repeated request for the same process keeps the first deadline.
    ///
    /// Returns the token that was signalled, or `None` if idle.
    pub fn terminate<T: KillTarget>(&mut self, target: &Arc<T>, kill_timeout: Duration) -> Option<u64> {
        let active = self.active.as_ref()?;
        let token = active.token;
        // A closed channel means the supervising task already finished.
        let _ = active.control.send(Control::Terminate);
        if !self.kill.is_armed_for(token) {
            self.kill.arm(target, token, kill_timeout);
        }
        Some(token)
    }

    /// Send `Kill` if `token` is still the active process.
    pub fn kill_if_current(&self, token: u64) -> bool {
        match &self.active {
            Some(active) if active.token == token => active.control.send(Control::Kill).is_ok(),
            _ => false,
        }
    }
}
