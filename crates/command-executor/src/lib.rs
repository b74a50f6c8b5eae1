//! Runtime-agnostic command execution library
//!
//! This crate provides a small, uniform interface for running local
//! subprocesses: a cloneable [`Command`] description, a [`Launcher`] that
//! turns it into a stream of [`ProcessEvent`]s plus a [`ProcessHandle`], and
//! convenience helpers that wait for completion while capturing stdout and
//! stderr separately.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod event;
pub mod launcher;
pub mod process;

pub use backends::local::{LocalLauncher, LocalProcessHandle, ProcessEventStream};
pub use command::Command;
pub use error::{Error, Result};
pub use event::{LogSource, ProcessEvent, ProcessEventType};
pub use launcher::Launcher;
pub use process::{ExitResult, ExitStatus, ProcessHandle};
