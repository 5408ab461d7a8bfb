// src/exec/pty.rs

//! Pseudo-terminal execution via `portable-pty`.

use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtyPair, PtySize, native_pty_system};
use tokio::sync::{mpsc, oneshot};

use crate::exec::process::{ExitReport, ProcessSpec};

const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

/// A child attached to a pty as its controlling terminal.
///
/// Reading and waiting are blocking in `portable-pty`, so both run on
/// dedicated OS threads and report back over channels.
pub struct PtyProcess {
    pid: Option<u32>,
    exit: oneshot::Receiver<io::Result<ExitReport>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    master: Option<Box<dyn MasterPty + Send>>,
}

impl fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyProcess")
            .field("pid", &self.pid)
            .field("master_open", &self.master.is_some())
            .finish_non_exhaustive()
    }
}

impl PtyProcess {
    /// Spawn `spec` on a fresh pty. Returns the process and the receiver of
    /// its combined output.
    pub fn spawn(spec: &ProcessSpec) -> Result<(Self, mpsc::UnboundedReceiver<Vec<u8>>)> {
        let PtyPair { slave, master } = native_pty_system()
            .openpty(PTY_SIZE)
            .context("allocating pty")?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = slave
            .spawn_command(cmd)
            .with_context(|| format!("spawning {:?} on pty", spec.program))?;
        // Only the child keeps the slave side open, so the reader sees EOF
        // once it exits.
        drop(slave);

        let pid = child.process_id();
        let mut killer = child.clone_killer();

        let reader = match master.try_clone_reader() {
            Ok(reader) => reader,
            Err(err) => {
                let _ = killer.kill();
                return Err(err.context("cloning pty reader"));
            }
        };

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        if let Err(err) = thread::Builder::new()
            .name("ghost-pty-reader".into())
            .spawn(move || read_chunks(reader, chunk_tx))
        {
            let _ = killer.kill();
            return Err(anyhow::Error::new(err).context("starting pty reader"));
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let waiter = thread::Builder::new()
            .name("ghost-pty-wait".into())
            .spawn(move || {
                let report = child.wait().map(|status| ExitReport {
                    code: i32::try_from(status.exit_code()).ok(),
                    success: status.success(),
                });
                let _ = exit_tx.send(report);
            });
        if let Err(err) = waiter {
            let _ = killer.kill();
            return Err(anyhow::Error::new(err).context("starting pty waiter"));
        }

        Ok((
            Self {
                pid,
                exit: exit_rx,
                killer,
                master: Some(master),
            },
            chunk_rx,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub async fn wait(&mut self) -> io::Result<ExitReport> {
        match (&mut self.exit).await {
            Ok(report) => report,
            Err(_) => Err(io::Error::other("pty wait thread ended without a status")),
        }
    }

    /// Drop the master side. Children attached to the pty get SIGHUP.
    pub fn close_master(&mut self) {
        self.master.take();
    }

    pub fn kill(&mut self) -> io::Result<()> {
        self.killer.kill()
    }
}

fn read_chunks(mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            // EIO once the slave side is gone.
            Err(_) => break,
        }
    }
}
