//! Test utilities
//!
//! [`RecordingRuntime`] stands in for real tools: it records every command
//! and answers with canned stdout, so workflows can be interpreted without
//! docker, terraform or kubectl installed.

use crate::{Error, Result, runtime::Runtime};
use async_trait::async_trait;
use command_executor::Command;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Response {
    Stdout(String),
    Fail { code: i32, stderr: String },
}

/// A runtime that records commands instead of running them
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    commands: Mutex<Vec<Command>>,
    responses: Mutex<Vec<(String, Response)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingRuntime {
    /// Create a runtime that answers every command with empty stdout
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose command line starts with `prefix` with `stdout`
    ///
    /// Responses are matched in the order they were registered.
    pub fn respond(&self, prefix: &str, stdout: &str) -> &Self {
        lock(&self.responses).push((prefix.to_string(), Response::Stdout(stdout.to_string())));
        self
    }

    /// Fail commands whose command line starts with `prefix`
    pub fn fail(&self, prefix: &str, stderr: &str) -> &Self {
        lock(&self.responses).push((
            prefix.to_string(),
            Response::Fail {
                code: 1,
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Every command received so far
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.commands).clone()
    }

    /// Command lines of every command received so far
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.commands).iter().map(ToString::to_string).collect()
    }

    fn answer(&self, command: Command) -> Result<String> {
        let line = command.to_string();
        let response = lock(&self.responses)
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone());
        lock(&self.commands).push(command.clone());

        match response {
            None => Ok(String::new()),
            Some(Response::Stdout(stdout)) => Ok(stdout),
            Some(Response::Fail { code, stderr }) => Err(Error::CommandFailed {
                command: line,
                dir: command
                    .get_current_dir()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| ".".to_string()),
                code: Some(code),
                stderr,
            }),
        }
    }
}

#[async_trait]
impl Runtime for RecordingRuntime {
    async fn run(&self, command: Command) -> Result<String> {
        self.answer(command)
    }

    async fn output(&self, command: Command) -> Result<String> {
        self.answer(command)
    }
}
