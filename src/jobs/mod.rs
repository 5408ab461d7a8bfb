// src/jobs/mod.rs

//! Job runtimes.
//!
//! - [`watch`]: rerun a command when files under a root change.
//! - [`server`]: keep a long-lived command running, logging its output.
//! - [`kill_switch`]: the shared "one live process" slot and forced-kill
//!   timer both runtimes use.
//!
//! Each job runs on its own background task from construction until
//! [`Supervised::close`] returns.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::exec::ExitReport;
use crate::logging::{JobLogger, LogSink, TracingSink};
use crate::watch::{EventSource, NotifySource};

pub mod kill_switch;
pub mod server;
pub mod watch;

pub use kill_switch::{KillSwitch, KillTarget, ProcessSlot};
pub use server::ServerJob;
pub use watch::WatchJob;

/// Collaborators injected into every job at construction.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub sink: Arc<dyn LogSink>,
    pub events: Arc<dyn EventSource>,
}

impl JobContext {
    pub fn new(sink: Arc<dyn LogSink>, events: Arc<dyn EventSource>) -> Self {
        Self { sink, events }
    }

    /// `tracing` for job lines, `notify` for filesystem events.
    pub fn production() -> Self {
        Self::new(Arc::new(TracingSink), Arc::new(NotifySource))
    }

    pub fn logger(&self, prefix: impl Into<Arc<str>>) -> JobLogger {
        JobLogger::new(Arc::clone(&self.sink), prefix)
    }
}

/// A job type a manager can start from a spec and close again.
pub trait Supervised: Send + Sync + Sized + 'static {
    type Spec: Send + Sync + 'static;

    /// Noun used in manager log lines ("watcher", "server").
    const KIND: &'static str;

    fn spec_name(spec: &Self::Spec) -> &str;

    /// Construct and start running in the background.
    fn start(spec: Self::Spec, ctx: &JobContext) -> Result<Self>;

    fn name(&self) -> &str;

    /// Stop the job: idempotent, returns once its loop has exited and no
    /// process remains.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Log one process exit on `log`, prefixed with `what` ("process exited").
pub(crate) fn log_exit(log: &JobLogger, what: &str, result: &io::Result<ExitReport>) {
    match result {
        Ok(ExitReport { success: true, .. }) => log.info(format!("{what} cleanly")),
        Ok(ExitReport { code: Some(code), .. }) => log.error(format!("{what} with code {code}")),
        Ok(ExitReport { code: None, .. }) => log.warn(format!("{what} after a signal")),
        Err(err) => log.error(format!("{what}: {err}")),
    }
}

/// Short label for an exit, used in log file banners.
pub(crate) fn exit_label(result: &io::Result<ExitReport>) -> String {
    match result {
        Ok(ExitReport { success: true, .. }) => "exited cleanly".to_string(),
        Ok(ExitReport { code: Some(code), .. }) => format!("exited with code {code}"),
        Ok(ExitReport { code: None, .. }) => "exited after a signal".to_string(),
        Err(err) => format!("wait failed: {err}"),
    }
}

/// Wait until a `bool` watch channel reads true (or its sender is gone).
pub(crate) async fn wait_until_set(rx: &mut tokio::sync::watch::Receiver<bool>) {
    let _ = rx.wait_for(|set| *set).await;
}
