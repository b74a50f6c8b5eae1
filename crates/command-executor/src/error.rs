//! Error types for command execution

use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The program could not be found on `PATH`
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The program that was not found
        command: String,
    },

    /// Waiting on a running process failed
    #[error("failed to wait for process {pid}: {reason}")]
    WaitFailed {
        /// The process id
        pid: u32,
        /// The reason reported by the OS
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Map an I/O error raised while spawning `program` to the matching variant
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::CommandNotFound {
                command: program.to_string(),
            },
            _ => Self::spawn_failed(format!("{}: {}", program, err)),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
