//! Error types for planning and running deployments

use crate::JobId;

/// Error types for rollout operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration parsing, environment or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] rollout_config::ConfigError),

    /// Process spawning errors
    #[error("Command execution error: {0}")]
    CommandExecutor(#[from] command_executor::Error),

    /// A component that cannot be turned into a job
    #[error("Invalid component {id}: {reason}")]
    InvalidComponent {
        /// Component id
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// A prerequisite that is not part of the graph
    #[error("the dependency {dependency:?} of node {node:?} is not an existing node")]
    DanglingDependency {
        /// The missing prerequisite
        dependency: String,
        /// The node that requires it
        node: String,
    },

    /// The dependency graph is not acyclic
    #[error("the graph contains a cycle")]
    Cycle,

    /// Skip list and skip outputs disagree in size
    #[error(
        "the number of skipped jobs ({skipped}) doesn't match the number of skipped jobs outputs ({outputs})"
    )]
    SkipCountMismatch {
        /// Number of skipped jobs
        skipped: usize,
        /// Number of output maps supplied
        outputs: usize,
    },

    /// A skipped job without substitute outputs
    #[error("skipped job {0} has no outputs supplied")]
    MissingSkippedOutputs(String),

    /// A skipped job that does not exist
    #[error("cannot skip {0}: no such job")]
    UnknownSkippedJob(String),

    /// A job that does not exist
    #[error("job {0} is not defined")]
    UnknownJob(String),

    /// An output reference without the `job.key` form
    #[error("malformed output reference {0:?}: expected <job>.<key>")]
    MalformedOutputRef(String),

    /// An output reference that cannot be satisfied
    #[error(
        "job {job}: output {key:?} of {referenced} not found{}",
        describe_available(.available)
    )]
    UnresolvedOutput {
        /// The job whose command holds the reference
        job: JobId,
        /// The job being referenced
        referenced: JobId,
        /// The missing key
        key: String,
        /// Listing of every known output, in debug mode
        available: Option<String>,
    },

    /// An output reference to a job that has not finished
    #[error("job {job}: outputs of {referenced} are not ready")]
    OutputsNotReady {
        /// The job whose command holds the reference
        job: JobId,
        /// The job being referenced
        referenced: JobId,
    },

    /// A command exited unsuccessfully
    #[error("executing `{command}` in {dir:?} failed ({}): {stderr}", describe_exit(.code))]
    CommandFailed {
        /// The command line
        command: String,
        /// Working directory
        dir: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// Output collection failed
    #[error("Output error: {0}")]
    Output(String),

    /// An error attributed to a single job
    #[error("job {job} failed: {source}")]
    Job {
        /// The failing job
        job: JobId,
        /// What went wrong
        source: Box<Error>,
    },

    /// A job that failed earlier on the same interpreter
    #[error("job {0} failed in an earlier run")]
    AlreadyFailed(JobId),

    /// Several jobs of one phase failed
    #[error("{} jobs failed:\n{}", .0.len(), list_errors(.0))]
    JobsFailed(Vec<Error>),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attribute this error to `job`
    pub fn in_job(self, job: &JobId) -> Self {
        match self {
            Error::Job { .. } => self,
            other => Error::Job {
                job: job.clone(),
                source: Box::new(other),
            },
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn describe_available(available: &Option<String>) -> String {
    available
        .as_ref()
        .map(|listing| format!(" (available outputs: {})", listing))
        .unwrap_or_default()
}

fn list_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
