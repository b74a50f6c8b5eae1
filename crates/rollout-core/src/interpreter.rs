//! Phased execution of a workflow
//!
//! Phases run strictly in order. Jobs inside a phase run concurrently unless
//! [`RunOptions::sequential`] is set; in concurrent mode every job of the
//! phase is allowed to finish and all failures are reported together before
//! the next phase would have started.
//!
//! Each job's outputs are written exactly once, when the job completes. The
//! phase barrier guarantees a job's outputs are in place before any job of a
//! later phase reads them.

use crate::{
    Error, JobId, Result,
    driver::{Arg, Cmd, CollectContext, Op, OutputRef, Outputs},
    runtime::Runtime,
    workflow::{Job, Workflow, format_phase},
};
use command_executor::Command;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, error, info};

/// Options for a diff or apply run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run the jobs of a phase one after another
    pub sequential: bool,
    /// List every available output when a reference cannot be resolved
    pub debug: bool,
    /// Environment variables set on every command
    pub env: BTreeMap<String, String>,
}

/// Outputs of every job that produced any, keyed by job id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunReport(pub BTreeMap<JobId, Outputs>);

impl RunReport {
    /// Outputs of `job`
    pub fn get(&self, job: &str) -> Option<&Outputs> {
        self.0.get(JobId::new(job).as_str())
    }

    /// Render as indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Lifecycle of a job within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Not started
    Pending,
    /// Adopted supplied outputs without running
    Skipped,
    /// Steps in progress
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

#[derive(Debug)]
struct JobState {
    status: Mutex<JobStatus>,
    outputs: OnceLock<Outputs>,
}

impl JobState {
    fn new() -> Self {
        Self {
            status: Mutex::new(JobStatus::Pending),
            outputs: OnceLock::new(),
        }
    }

    fn status(&self) -> JobStatus {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, status: JobStatus) {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    /// Move from pending to running; false if the job already ran or is running
    fn begin(&self, id: &JobId) -> Result<bool> {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *status {
            JobStatus::Pending => {
                *status = JobStatus::Running;
                Ok(true)
            }
            JobStatus::Failed => Err(Error::AlreadyFailed(id.clone())),
            _ => Ok(false),
        }
    }

    /// Move from pending to `next`; false if the job was already started
    fn start(&self, next: JobStatus) -> bool {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *status != JobStatus::Pending {
            return false;
        }
        *status = next;
        true
    }
}

/// Runs a loaded workflow against a [`Runtime`]
pub struct Interpreter<'a> {
    workflow: &'a Workflow,
    runtime: &'a dyn Runtime,
    options: RunOptions,
    states: BTreeMap<JobId, JobState>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter; every job starts out pending
    pub fn new(workflow: &'a Workflow, runtime: &'a dyn Runtime, options: RunOptions) -> Self {
        let states = workflow
            .jobs
            .keys()
            .map(|id| (id.clone(), JobState::new()))
            .collect();
        Self {
            workflow,
            runtime,
            options,
            states,
        }
    }

    /// Preview changes
    pub async fn diff(&self) -> Result<RunReport> {
        self.run(Op::Diff).await
    }

    /// Make changes
    pub async fn apply(&self) -> Result<RunReport> {
        self.run(Op::Apply).await
    }

    /// Run every phase of the plan for `op`
    pub async fn run(&self, op: Op) -> Result<RunReport> {
        let total = self.workflow.plan.len();
        for (i, phase) in self.workflow.plan.iter().enumerate() {
            info!("Phase {}/{} ({}): {}", i + 1, total, op, format_phase(phase));

            if self.options.sequential {
                for id in phase {
                    self.run_job(id, op).await?;
                }
            } else {
                let results = join_all(phase.iter().map(|id| self.run_job(id, op))).await;
                let mut errors: Vec<Error> = results.into_iter().filter_map(|r| r.err()).collect();
                match errors.len() {
                    0 => {}
                    1 => return Err(errors.remove(0)),
                    _ => return Err(Error::JobsFailed(errors)),
                }
            }
            debug!("Phase {}/{} done", i + 1, total);
        }
        Ok(self.report())
    }

    /// Status of `job`, if it is part of the workflow
    pub fn status(&self, job: &str) -> Option<JobStatus> {
        self.states
            .get(JobId::new(job).as_str())
            .map(JobState::status)
    }

    /// Outputs of `job` once it has completed or been skipped
    pub fn outputs(&self, job: &str) -> Option<&Outputs> {
        self.states.get(JobId::new(job).as_str())?.outputs.get()
    }

    /// Outputs collected so far
    pub fn report(&self) -> RunReport {
        RunReport(
            self.states
                .iter()
                .filter_map(|(id, state)| Some((id.clone(), state.outputs.get()?.clone())))
                .collect(),
        )
    }

    /// Run only the top-level output collector of `target`
    ///
    /// The collectors of the jobs `target` transitively needs are run first
    /// so that its output references resolve. No steps are executed.
    pub async fn collect_outputs(&self, target: &str, op: Op) -> Result<Outputs> {
        let target = self.workflow.job(target)?.id.clone();
        let prerequisites = self.prerequisites(&target);

        for phase in &self.workflow.plan {
            for id in phase.iter().filter(|id| prerequisites.contains(*id)) {
                self.collect_only(id, op).await?;
            }
        }
        self.collect_only(&target, op).await?;

        Ok(self.outputs(target.as_str()).cloned().unwrap_or_default())
    }

    fn prerequisites(&self, target: &JobId) -> BTreeSet<JobId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&JobId> = self
            .workflow
            .dependencies
            .get(target)
            .into_iter()
            .flatten()
            .collect();
        while let Some(id) = stack.pop() {
            if seen.insert(id.clone()) {
                stack.extend(self.workflow.dependencies.get(id).into_iter().flatten());
            }
        }
        seen
    }

    async fn collect_only(&self, id: &JobId, op: Op) -> Result<()> {
        let job = self.workflow.job(id.as_str())?;
        let state = self.state(id)?;

        if let Some(outputs) = &job.skipped {
            if state.start(JobStatus::Skipped) {
                let _ = state.outputs.set(outputs.clone());
            }
            return Ok(());
        }
        if !state.begin(id)? {
            return Ok(());
        }

        let mut outputs = Outputs::new();
        let result = match &job.driver.collector {
            Some(collector) => {
                let resolver = |reference: &OutputRef| self.resolve(id, reference);
                let ctx = CollectContext::new(self.runtime, id, &resolver);
                collector.collect(&ctx, op, &mut outputs).await
            }
            None => Ok(()),
        };
        self.finish(id, state, outputs, result)
    }

    async fn run_job(&self, id: &JobId, op: Op) -> Result<()> {
        let job = self.workflow.job(id.as_str())?;
        let state = self.state(id)?;

        if let Some(outputs) = &job.skipped {
            if state.start(JobStatus::Skipped) {
                info!("Skipping {}", id);
                let _ = state.outputs.set(outputs.clone());
            }
            return Ok(());
        }
        if !state.begin(id)? {
            debug!("{} already started", id);
            return Ok(());
        }

        info!("Running {} ({} {})", id, job.driver.kind, op);
        let mut outputs = Outputs::new();
        let result = self.execute(job, op, &mut outputs).await;
        self.finish(id, state, outputs, result)
    }

    fn finish(&self, id: &JobId, state: &JobState, outputs: Outputs, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                debug!("{} produced {} outputs", id, outputs.len());
                let _ = state.outputs.set(outputs);
                state.set_status(JobStatus::Completed);
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {}", id, e);
                state.set_status(JobStatus::Failed);
                Err(e.in_job(id))
            }
        }
    }

    async fn execute(&self, job: &Job, op: Op, outputs: &mut Outputs) -> Result<()> {
        let resolver = |reference: &OutputRef| self.resolve(&job.id, reference);

        for step in job.driver.steps(op) {
            if !step.guard_passes(outputs) {
                debug!("{}: skipping step {}", job.id, step.name);
                continue;
            }

            for cmd in &step.run {
                let command = self.build_command(&job.id, cmd)?;
                self.runtime.run(command).await?;
            }

            if let Some(collector) = &step.collector {
                let ctx = CollectContext::new(self.runtime, &job.id, &resolver);
                collector.collect(&ctx, op, outputs).await?;
            }
        }

        if let Some(collector) = &job.driver.collector {
            let ctx = CollectContext::new(self.runtime, &job.id, &resolver);
            collector.collect(&ctx, op, outputs).await?;
        }
        Ok(())
    }

    /// Turn a step command into a runnable one, resolving output references
    fn build_command(&self, job: &JobId, cmd: &Cmd) -> Result<Command> {
        let mut command = Command::new(cmd.program.as_str());
        for arg in &cmd.args {
            match arg {
                Arg::Literal(value) => command.arg(value.as_str()),
                Arg::Output { prefix, reference } => {
                    let value = self.resolve(job, reference)?;
                    command.arg(format!("{}{}", prefix, value))
                }
            };
        }
        command
            .current_dir(&cmd.dir)
            .envs(&cmd.env)
            .envs(&self.options.env);
        Ok(command)
    }

    /// Look up the output `reference` made from `job`
    fn resolve(&self, job: &JobId, reference: &OutputRef) -> Result<String> {
        let referenced = job.resolve(&reference.job);
        let unresolved = || Error::UnresolvedOutput {
            job: job.clone(),
            referenced: referenced.clone(),
            key: reference.key.clone(),
            available: self.options.debug.then(|| self.available_outputs()),
        };

        let state = self.states.get(&referenced).ok_or_else(unresolved)?;
        let outputs = state.outputs.get().ok_or_else(|| Error::OutputsNotReady {
            job: job.clone(),
            referenced: referenced.clone(),
        })?;
        outputs.get(&reference.key).cloned().ok_or_else(unresolved)
    }

    fn available_outputs(&self) -> String {
        let listing: Vec<String> = self
            .states
            .iter()
            .filter_map(|(id, state)| {
                let outputs = state.outputs.get()?;
                let keys: Vec<&str> = outputs.keys().map(String::as_str).collect();
                Some(format!("{}: {{{}}}", id, keys.join(", ")))
            })
            .collect();
        if listing.is_empty() {
            "none".to_string()
        } else {
            listing.join("; ")
        }
    }

    fn state(&self, id: &JobId) -> Result<&JobState> {
        self.states
            .get(id)
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }
}
