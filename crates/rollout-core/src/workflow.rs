//! Workflow loading and plan construction
//!
//! Flattens the environment-resolved component tree into a job table, adds
//! the synthetic git job, applies skips and sorts the dependency map into
//! phases.

use crate::{
    Error, JobId, Result,
    driver::{self, Driver, Outputs},
    scheduler::topological_sort,
};
use rollout_config::{Component, environment};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options controlling how a workflow is loaded
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Environment to apply
    pub env: Option<String>,
    /// Jobs to skip, as bare names or absolute ids
    pub skip: Vec<String>,
    /// Substitute outputs for every skipped job
    pub skipped_jobs_outputs: BTreeMap<String, Outputs>,
}

/// Whether a job does work of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Backed by a driver
    Leaf,
    /// Only groups other components
    Group,
}

/// A flattened, executable component
#[derive(Debug, Clone)]
pub struct Job {
    /// Identifier
    pub id: JobId,
    /// Working directory
    pub dir: PathBuf,
    /// Resolved prerequisites
    pub needs: Vec<JobId>,
    /// Diff/apply contract
    pub driver: Driver,
    /// Leaf or group
    pub kind: JobKind,
    /// Substitute outputs when the job is skipped
    pub skipped: Option<Outputs>,
}

/// A loaded workflow: job table plus execution plan
#[derive(Debug)]
pub struct Workflow {
    /// Phases in execution order
    pub plan: Vec<Vec<JobId>>,
    /// Every job, including the git job
    pub jobs: BTreeMap<JobId, Job>,
    /// The dependency map the plan was sorted from
    pub dependencies: BTreeMap<JobId, Vec<JobId>>,
}

impl Workflow {
    /// Load the workflow described by `config`
    pub fn load(config: &Component, options: &LoadOptions) -> Result<Self> {
        let config = environment::resolve(config, options.env.as_deref())?;
        let root = if config.dir.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&config.dir)
        };

        let mut jobs = BTreeMap::new();
        jobs.insert(
            JobId::git(),
            Job {
                id: JobId::git(),
                dir: root.clone(),
                needs: Vec::new(),
                driver: driver::git::driver(&root),
                kind: JobKind::Leaf,
                skipped: None,
            },
        );
        load_components(&mut jobs, None, &root, &config.components)?;

        apply_skips(&mut jobs, options)?;

        let dependencies = dependency_map(&jobs);
        let sortable: HashMap<JobId, Vec<JobId>> = dependencies
            .iter()
            .map(|(id, needs)| (id.clone(), needs.clone()))
            .collect();
        let mut plan = topological_sort(&sortable)?;
        drop_groups_from_first_phase(&mut plan, &jobs);

        info!(
            "Loaded {} jobs into {} phases",
            dependencies.len(),
            plan.len()
        );
        for (i, phase) in plan.iter().enumerate() {
            debug!("Phase {}: {}", i + 1, format_phase(phase));
        }

        Ok(Self {
            plan,
            jobs,
            dependencies,
        })
    }

    /// Look up a job by bare name or id
    pub fn job(&self, id: &str) -> Result<&Job> {
        self.jobs
            .get(JobId::new(id).as_str())
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }
}

/// Render a phase as a comma-separated list of ids
pub fn format_phase(phase: &[JobId]) -> String {
    phase
        .iter()
        .map(JobId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn load_components(
    jobs: &mut BTreeMap<JobId, Job>,
    parent: Option<&JobId>,
    parent_dir: &Path,
    components: &BTreeMap<String, Component>,
) -> Result<()> {
    for (name, component) in components {
        let id = match parent {
            Some(parent) => parent.child(name),
            None => JobId::new(name),
        };

        if jobs.contains_key(&id) {
            return Err(Error::InvalidComponent {
                id: id.to_string(),
                reason: "the identifier is already taken".to_string(),
            });
        }

        let dir = working_dir(parent_dir, &component.dir);
        let needs = component.needs.iter().map(|n| id.resolve(n)).collect();
        let config = component.driver()?;
        let driver = driver::new_driver(&id, &dir, config.as_ref())?;
        let kind = if config.is_some() {
            JobKind::Leaf
        } else {
            JobKind::Group
        };

        debug!("Loaded {} ({}) in {}", id, driver.kind, dir.display());
        jobs.insert(
            id.clone(),
            Job {
                id: id.clone(),
                dir: dir.clone(),
                needs,
                driver,
                kind,
                skipped: None,
            },
        );

        load_components(jobs, Some(&id), &dir, &component.components)?;
    }
    Ok(())
}

/// An absolute `dir` wins, a relative one is joined onto the parent's
fn working_dir(parent: &Path, dir: &str) -> PathBuf {
    if dir.is_empty() {
        parent.to_path_buf()
    } else {
        parent.join(dir)
    }
}

fn apply_skips(jobs: &mut BTreeMap<JobId, Job>, options: &LoadOptions) -> Result<()> {
    if options.skip.len() != options.skipped_jobs_outputs.len() {
        return Err(Error::SkipCountMismatch {
            skipped: options.skip.len(),
            outputs: options.skipped_jobs_outputs.len(),
        });
    }

    let supplied: BTreeMap<JobId, &Outputs> = options
        .skipped_jobs_outputs
        .iter()
        .map(|(name, outputs)| (JobId::new(name), outputs))
        .collect();

    for name in &options.skip {
        let id = JobId::new(name);
        let outputs = supplied
            .get(&id)
            .ok_or_else(|| Error::MissingSkippedOutputs(id.to_string()))?;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownSkippedJob(id.to_string()))?;

        info!("Skipping {} with {} supplied outputs", id, outputs.len());
        job.skipped = Some((*outputs).clone());
    }
    Ok(())
}

/// Skipped jobs become roots; git only takes part when something needs it
fn dependency_map(jobs: &BTreeMap<JobId, Job>) -> BTreeMap<JobId, Vec<JobId>> {
    let mut dependencies: BTreeMap<JobId, Vec<JobId>> = jobs
        .values()
        .filter(|job| !job.id.is_git())
        .map(|job| {
            let needs = if job.skipped.is_some() {
                Vec::new()
            } else {
                job.needs.clone()
            };
            (job.id.clone(), needs)
        })
        .collect();

    let git = JobId::git();
    if dependencies.values().any(|needs| needs.contains(&git)) {
        let needs = jobs.get(&git).map(|job| job.needs.clone()).unwrap_or_default();
        dependencies.insert(git, needs);
    }
    dependencies
}

/// Drop grouping jobs from the first phase, unless nothing else is in it
///
/// A skipped group stays: it carries supplied outputs its dependents read.
fn drop_groups_from_first_phase(plan: &mut [Vec<JobId>], jobs: &BTreeMap<JobId, Job>) {
    let Some(first) = plan.first_mut() else {
        return;
    };
    let leaves: Vec<JobId> = first
        .iter()
        .filter(|id| {
            jobs.get(*id)
                .is_none_or(|job| job.kind != JobKind::Group || job.skipped.is_some())
        })
        .cloned()
        .collect();
    if !leaves.is_empty() {
        *first = leaves;
    }
}
