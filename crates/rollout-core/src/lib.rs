//! Core planning and execution for rollout
//!
//! A configuration tree is loaded into a [`Workflow`]: a table of jobs, one
//! per component plus a synthetic `/git` job, and a plan of phases computed
//! from the jobs' prerequisites. The [`Interpreter`] then runs the phases in
//! order, handing each job's commands to a [`Runtime`] and threading outputs
//! from one job into the commands of the jobs that need it.
//!
//! ```no_run
//! use rollout_core::{Interpreter, LoadOptions, LocalRuntime, RunOptions, Workflow};
//!
//! # async fn example(config: rollout_config::Component) -> rollout_core::Result<()> {
//! let workflow = Workflow::load(&config, &LoadOptions::default())?;
//! let runtime = LocalRuntime::new();
//! let report = Interpreter::new(&workflow, &runtime, RunOptions::default())
//!     .apply()
//!     .await?;
//! println!("{}", report.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod driver;
pub mod error;
pub mod id;
pub mod interpreter;
pub mod runtime;
pub mod scheduler;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use driver::{Op, Outputs};
pub use error::Error;
pub use id::JobId;
pub use interpreter::{Interpreter, JobStatus, RunOptions, RunReport};
pub use runtime::{LocalRuntime, Runtime};
pub use scheduler::topological_sort;
pub use workflow::{Job, JobKind, LoadOptions, Workflow};

/// Result type for rollout operations
pub type Result<T> = std::result::Result<T, Error>;
