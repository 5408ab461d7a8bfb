// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] spawns commands (inherited stdio, pipes, or a pty) and
//!   supervises one child per task, serving terminate/kill requests.
//! - [`pty`] is the `portable-pty` backend.
//! - [`output`] copies captured output into a shared log file and mirrors it
//!   to the daemon's streams.

pub mod output;
pub mod process;
pub mod pty;

pub use output::{LogTee, Mirror, OutputStream, pump};
pub use process::{Control, ExitReport, OutputMode, Process, ProcessSpec, Spawned, spawn};
