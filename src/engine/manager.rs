// src/engine/manager.rs

//! Whole-set hot swap of live jobs.

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::jobs::{JobContext, ServerJob, Supervised, WatchJob};

/// The live generation of one kind of job.
///
/// `apply` tears the previous generation down completely before building
/// the next one. The lock is held for the whole swap, so concurrent applies
/// are serialised and readers never observe a half-built set.
#[derive(Debug)]
pub struct Manager<J: Supervised> {
    ctx: JobContext,
    jobs: Mutex<Vec<J>>,
}

pub type WatchManager = Manager<WatchJob>;
pub type ServerManager = Manager<ServerJob>;

impl<J: Supervised> Manager<J> {
    pub fn new(ctx: JobContext) -> Self {
        Self {
            ctx,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Replace the live set with jobs built from `specs`.
    ///
    /// A spec whose job fails to start is logged and skipped; its siblings
    /// still start.
    pub async fn apply(&self, specs: Vec<J::Spec>) {
        let mut jobs = self.jobs.lock().await;
        close_all(std::mem::take(&mut *jobs)).await;

        let mut next = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = J::spec_name(&spec).to_string();
            match J::start(spec, &self.ctx) {
                Ok(job) => next.push(job),
                Err(err) => error!("failed to start {} {name:?}: {err}", J::KIND),
            }
        }

        info!("loaded {} {}(s)", next.len(), J::KIND);
        *jobs = next;
    }

    /// Close every job and leave the set empty.
    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.lock().await;
        close_all(std::mem::take(&mut *jobs)).await;
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Names of the live jobs, in spec order.
    pub async fn names(&self) -> Vec<String> {
        self.jobs
            .lock()
            .await
            .iter()
            .map(|job| job.name().to_string())
            .collect()
    }
}

async fn close_all<J: Supervised>(jobs: Vec<J>) {
    for job in jobs {
        job.close().await;
    }
}
