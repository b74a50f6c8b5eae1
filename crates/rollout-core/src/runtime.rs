//! Command runtime
//!
//! The interpreter and the output collectors never spawn processes
//! themselves; they hand fully resolved [`Command`]s to a [`Runtime`].

use crate::{Error, Result};
use async_trait::async_trait;
use command_executor::{Command, Launcher, LocalLauncher};
use tracing::{debug, info};

/// Executes commands on behalf of jobs
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run `command`, streaming its output live, and return its stdout
    async fn run(&self, command: Command) -> Result<String>;

    /// Run `command` quietly and return its stdout
    async fn output(&self, command: Command) -> Result<String>;
}

/// Runs commands as local subprocesses
#[derive(Debug, Clone, Default)]
pub struct LocalRuntime<L = LocalLauncher> {
    launcher: L,
}

impl LocalRuntime {
    /// Create a runtime spawning local processes
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: Launcher> LocalRuntime<L> {
    /// Create a runtime on top of a specific launcher
    pub fn with_launcher(launcher: L) -> Self {
        Self { launcher }
    }

    async fn execute(&self, command: Command, stream: bool) -> Result<String> {
        let program = command.get_program().to_string();
        let result = self
            .launcher
            .execute_with(command.clone(), |event| {
                if !stream {
                    return;
                }
                if let (Some(_), Some(line)) = (event.source(), &event.data) {
                    info!("[{}] {}", program, line);
                }
            })
            .await?;

        if !result.status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                dir: command
                    .get_current_dir()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| ".".to_string()),
                code: result.status.code,
                stderr: result.stderr.trim_end().to_string(),
            });
        }

        Ok(result.stdout)
    }
}

#[async_trait]
impl<L: Launcher> Runtime for LocalRuntime<L> {
    async fn run(&self, command: Command) -> Result<String> {
        info!("Running `{}`", command);
        self.execute(command, true).await
    }

    async fn output(&self, command: Command) -> Result<String> {
        debug!("Capturing `{}`", command);
        self.execute(command, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn test_output_captures_stdout() {
        let runtime = LocalRuntime::new();
        let command = Command::builder("sh").arg("-c").arg("echo hello").build();
        assert_eq!(runtime.output(command).await.unwrap(), "hello\n");
    }

    #[smol_potat::test]
    async fn test_failure_carries_context() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = LocalRuntime::new();
        let command = Command::builder("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 3")
            .current_dir(dir.path())
            .build();

        match runtime.run(command).await {
            Err(Error::CommandFailed {
                command,
                dir: failed_in,
                code,
                stderr,
            }) => {
                assert_eq!(command, r#"sh -c "echo broken >&2; exit 3""#);
                assert_eq!(failed_in, dir.path().display().to_string());
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }
}
