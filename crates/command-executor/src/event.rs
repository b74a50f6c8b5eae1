//! Raw process events

/// A raw event from a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(event_type: ProcessEventType) -> Self {
        Self {
            event_type,
            data: None,
        }
    }

    /// Create a new process event carrying a line of output
    pub fn line(source: LogSource, line: String) -> Self {
        let event_type = match source {
            LogSource::Stdout => ProcessEventType::Stdout,
            LogSource::Stderr => ProcessEventType::Stderr,
        };
        Self {
            event_type,
            data: Some(line),
        }
    }

    /// The output stream this event came from, if it is a log line
    pub fn source(&self) -> Option<LogSource> {
        match self.event_type {
            ProcessEventType::Stdout => Some(LogSource::Stdout),
            ProcessEventType::Stderr => Some(LogSource::Stderr),
            ProcessEventType::Started { .. } => None,
        }
    }
}

/// Types of raw process events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Process has started
    Started {
        /// OS process id
        pid: u32,
    },
    /// Log line from stdout
    Stdout,
    /// Log line from stderr
    Stderr,
}

/// Source of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}
