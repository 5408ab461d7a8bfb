// src/exec/output.rs

//! Output plumbing for captured processes.
//!
//! Pipe and pty output are both exposed as [`OutputStream`]s, so the server
//! run loop copies "one or two streams" without caring about the mode. Every
//! copy goes through one [`LogTee`], which appends to the job's log file and
//! mirrors the bytes to the daemon's own stdout/stderr.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::errors::{GhostError, Result};
use crate::logging::JobLogger;

/// Which daemon stream a copy is mirrored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirror {
    Stdout,
    Stderr,
}

impl Mirror {
    fn label(self) -> &'static str {
        match self {
            Mirror::Stdout => "stdout",
            Mirror::Stderr => "stderr",
        }
    }
}

enum Source {
    Pipe(Box<dyn AsyncRead + Send + Unpin>),
    Chunks(mpsc::UnboundedReceiver<Vec<u8>>),
}

/// One readable output stream of a child process.
pub struct OutputStream {
    source: Source,
    mirror: Mirror,
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Pipe(_) => "pipe",
            Source::Chunks(_) => "chunks",
        };
        f.debug_struct("OutputStream")
            .field("source", &kind)
            .field("mirror", &self.mirror)
            .finish()
    }
}

impl OutputStream {
    pub fn pipe(reader: impl AsyncRead + Send + Unpin + 'static, mirror: Mirror) -> Self {
        Self {
            source: Source::Pipe(Box::new(reader)),
            mirror,
        }
    }

    pub fn chunks(rx: mpsc::UnboundedReceiver<Vec<u8>>, mirror: Mirror) -> Self {
        Self {
            source: Source::Chunks(rx),
            mirror,
        }
    }

    /// Next chunk, `None` at end of stream.
    async fn next_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<Option<Vec<u8>>> {
        match &mut self.source {
            Source::Pipe(reader) => {
                let n = reader.read(buf).await?;
                Ok((n > 0).then(|| buf[..n].to_vec()))
            }
            Source::Chunks(rx) => Ok(rx.recv().await),
        }
    }
}

/// Append-only log file shared by all copy tasks of one server run.
///
/// The mutex serialises whole chunks, so the log and the mirrored stream
/// never see interleaved partial writes.
#[derive(Debug, Clone)]
pub struct LogTee {
    file: Arc<Mutex<File>>,
}

impl LogTee {
    /// Create the parent directory and open `path` for appending.
    pub async fn open(path: &Path) -> Result<Self> {
        let log_err = |source: std::io::Error| GhostError::LogFile {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(log_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(log_err)?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Write to the log file only (banners).
    pub async fn write_log(&self, text: &str) -> std::io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    }

    /// Write a chunk to the log file and mirror it.
    pub async fn write_chunk(&self, bytes: &[u8], mirror: Mirror) -> std::io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(bytes).await?;
        match mirror {
            Mirror::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(bytes).await?;
                out.flush().await
            }
            Mirror::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(bytes).await?;
                err.flush().await
            }
        }
    }
}

/// Copy `stream` into `tee` until end of stream, on its own task.
///
/// Copy errors are logged and end the copy; they never end the job.
pub fn pump(mut stream: OutputStream, tee: LogTee, log: JobLogger) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match stream.next_chunk(&mut buf).await {
                Ok(Some(chunk)) => {
                    if let Err(err) = tee.write_chunk(&chunk, stream.mirror).await {
                        log.error(format!("{} log write error: {err}", stream.mirror.label()));
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    log.error(format!("{} stream error: {err}", stream.mirror.label()));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingSink;

    #[tokio::test]
    async fn open_creates_missing_directories_and_appends() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/server.log");

        let tee = LogTee::open(&path).await?;
        tee.write_log("first\n").await?;
        drop(tee);

        let tee = LogTee::open(&path).await?;
        tee.write_log("second\n").await?;

        assert_eq!(tokio::fs::read_to_string(&path).await?, "first\nsecond\n");
        Ok(())
    }

    #[tokio::test]
    async fn pump_copies_pipe_and_chunk_streams() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.log");
        let tee = LogTee::open(&path).await?;
        let log = JobLogger::new(Arc::new(TracingSink), "ghost:server:test");

        let pipe = OutputStream::pipe(&b"from pipe\n"[..], Mirror::Stderr);
        pump(pipe, tee.clone(), log.clone()).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(b"from pty\n".to_vec())?;
        drop(tx);
        pump(OutputStream::chunks(rx, Mirror::Stdout), tee, log).await?;

        assert_eq!(
            tokio::fs::read_to_string(&path).await?,
            "from pipe\nfrom pty\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_location_is_a_log_file_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("file");
        tokio::fs::write(&blocker, b"x").await?;

        let err = LogTee::open(&blocker.join("server.log")).await.unwrap_err();
        assert!(matches!(err, GhostError::LogFile { .. }));
        Ok(())
    }
}
