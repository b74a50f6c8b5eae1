//! Launcher trait for executing commands

use crate::command::Command;
use crate::error::Result;
use crate::event::{LogSource, ProcessEvent};
use crate::process::{ExitResult, ProcessHandle};
use async_trait::async_trait;
use futures::stream::Stream;

/// A launcher that can execute commands in a specific context
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning its event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;

    /// Execute a command and wait for it to complete, capturing output
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        self.execute_with(command, |_| {}).await
    }

    /// Execute a command, handing every event to `on_event` as it arrives
    ///
    /// Output is still captured into the returned [`ExitResult`], so callers
    /// can stream lines to a terminal and inspect them afterwards.
    async fn execute_with<F>(&self, command: Command, mut on_event: F) -> Result<ExitResult>
    where
        F: FnMut(&ProcessEvent) + Send,
    {
        use futures::StreamExt;

        let (mut events, mut handle) = self.launch(command).await?;
        let mut stdout = String::new();
        let mut stderr = String::new();

        while let Some(event) = events.next().await {
            on_event(&event);
            if let (Some(source), Some(data)) = (event.source(), &event.data) {
                let buf = match source {
                    LogSource::Stdout => &mut stdout,
                    LogSource::Stderr => &mut stderr,
                };
                buf.push_str(data);
                buf.push('\n');
            }
        }

        let status = handle.wait().await?;
        Ok(ExitResult {
            status,
            stdout,
            stderr,
        })
    }
}
