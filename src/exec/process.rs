// src/exec/process.rs

//! Spawning and supervising one child process.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{ServerSpec, WatchSpec};
use crate::errors::{GhostError, Result};
use crate::exec::output::{Mirror, OutputStream};
use crate::exec::pty::PtyProcess;
use crate::logging::JobLogger;

/// What to run, independent of how its output is wired.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub display: String,
    pub cwd: PathBuf,
    /// Overrides applied on top of the daemon's own environment.
    pub env: BTreeMap<String, String>,
}

impl From<&WatchSpec> for ProcessSpec {
    fn from(spec: &WatchSpec) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.args.clone(),
            display: spec.command_display.clone(),
            cwd: spec.cwd.clone(),
            env: spec.env.clone(),
        }
    }
}

impl From<&ServerSpec> for ProcessSpec {
    fn from(spec: &ServerSpec) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.args.clone(),
            display: spec.command_display.clone(),
            cwd: spec.cwd.clone(),
            env: spec.env.clone(),
        }
    }
}

/// How the child's output is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the daemon's stdout/stderr.
    Inherit,
    /// Separate stdout/stderr pipes.
    Piped,
    /// One combined stream from a pseudo-terminal.
    Pty,
}

/// Requests delivered to the task that owns a running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Terminate,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process died from a signal.
    pub code: Option<i32>,
    pub success: bool,
}

/// A freshly spawned process plus the output streams it exposes.
#[derive(Debug)]
pub struct Spawned {
    pub process: Process,
    pub outputs: Vec<OutputStream>,
}

#[derive(Debug)]
enum Backend {
    Native { child: Child, own_group: bool },
    Pty(PtyProcess),
}

/// A running child process. Owned by exactly one supervising task.
#[derive(Debug)]
pub struct Process {
    pid: Option<u32>,
    backend: Backend,
}

/// Start `spec` with the given output wiring.
pub fn spawn(spec: &ProcessSpec, mode: OutputMode) -> Result<Spawned> {
    let spawn_err = |source: anyhow::Error| GhostError::Spawn {
        command: spec.display.clone(),
        source,
    };

    if mode == OutputMode::Pty {
        let (pty, reader) = PtyProcess::spawn(spec).map_err(spawn_err)?;
        return Ok(Spawned {
            process: Process {
                pid: pty.pid(),
                backend: Backend::Pty(pty),
            },
            outputs: vec![OutputStream::chunks(reader, Mirror::Stdout)],
        });
    }

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match mode {
        OutputMode::Piped => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        _ => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
    }

    // Own process group so termination reaches grandchildren too.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {:?} in {:?}", spec.program, spec.cwd))
        .map_err(spawn_err)?;

    let mut outputs = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        outputs.push(OutputStream::pipe(stdout, Mirror::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        outputs.push(OutputStream::pipe(stderr, Mirror::Stderr));
    }

    Ok(Spawned {
        process: Process {
            pid: child.id(),
            backend: Backend::Native {
                child,
                own_group: cfg!(unix),
            },
        },
        outputs,
    })
}

impl Process {
    /// Wait for exit while serving `control` requests.
    ///
    /// If every control sender is dropped the process is left alone and
    /// simply awaited.
    pub async fn supervise(
        mut self,
        control: &mut mpsc::UnboundedReceiver<Control>,
        log: &JobLogger,
    ) -> io::Result<ExitReport> {
        let mut control_open = true;
        loop {
            tokio::select! {
                report = self.wait() => return report,
                msg = control.recv(), if control_open => match msg {
                    Some(Control::Terminate) => self.terminate(log),
                    Some(Control::Kill) => self.kill(log),
                    None => control_open = false,
                },
            }
        }
    }

    async fn wait(&mut self) -> io::Result<ExitReport> {
        match &mut self.backend {
            Backend::Native { child, .. } => {
                let status = child.wait().await?;
                Ok(ExitReport {
                    code: status.code(),
                    success: status.success(),
                })
            }
            Backend::Pty(pty) => pty.wait().await,
        }
    }

    /// Graceful stop: close the pty (if any), then SIGTERM.
    fn terminate(&mut self, log: &JobLogger) {
        debug!(pid = ?self.pid, "terminating process");
        let result = match &mut self.backend {
            Backend::Native { child, own_group } => match self.pid {
                Some(pid) => signal::terminate(pid, *own_group),
                None => ignore_reaped(child.start_kill()),
            },
            Backend::Pty(pty) => {
                pty.close_master();
                match self.pid {
                    Some(pid) => signal::terminate(pid, false),
                    None => pty.kill(),
                }
            }
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Unsupported => self.kill(log),
            Err(err) => log.error(format!("failed to send SIGTERM: {err}")),
        }
    }

    /// Forced stop.
    fn kill(&mut self, log: &JobLogger) {
        debug!(pid = ?self.pid, "killing process");
        let result = match &mut self.backend {
            Backend::Native { child, own_group } => {
                let group = match (self.pid, *own_group) {
                    (Some(pid), true) => signal::kill_group(pid),
                    _ => Ok(()),
                };
                group.and(ignore_reaped(child.start_kill()))
            }
            Backend::Pty(pty) => match self.pid.map(signal::kill_group) {
                Some(Err(err)) if err.kind() == io::ErrorKind::Unsupported => pty.kill(),
                Some(result) => result,
                None => pty.kill(),
            },
        };
        if let Err(err) = result {
            log.error(format!("failed to send SIGKILL: {err}"));
        }
    }
}

/// `start_kill` on a reaped child reports `InvalidInput`; that is not a
/// failure to stop it.
fn ignore_reaped(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
mod signal {
    use std::io;

    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    /// SIGTERM the process (or its whole group). A process that is already
    /// gone counts as success.
    pub(super) fn terminate(pid: u32, group: bool) -> io::Result<()> {
        let pid = Pid::from_raw(pid as i32);
        let result = if group {
            signal::killpg(pid, Signal::SIGTERM)
        } else {
            signal::kill(pid, Signal::SIGTERM)
        };
        ignore_missing(result)
    }

    pub(super) fn kill_group(pid: u32) -> io::Result<()> {
        ignore_missing(signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL))
    }

    fn ignore_missing(result: Result<(), Errno>) -> io::Result<()> {
        match result {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

#[cfg(not(unix))]
mod signal {
    use std::io;

    // Without POSIX signals the graceful path falls through to the backend's
    // own kill.
    pub(super) fn terminate(_pid: u32, _group: bool) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "graceful termination is not supported on this platform",
        ))
    }

    pub(super) fn kill_group(_pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process groups are not supported on this platform",
        ))
    }
}
