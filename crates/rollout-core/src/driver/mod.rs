//! Driver contract and factory
//!
//! A driver translates one component's configuration into ordered [`Step`]s
//! for `diff` and `apply`, plus an optional collector that produces the
//! component's outputs once its steps have run. Command arguments may refer
//! to other jobs' outputs; those references are parsed when the driver is
//! built and resolved by the interpreter right before a command runs.

use crate::{Error, JobId, Result, runtime::Runtime};
use async_trait::async_trait;
use rollout_config::DriverConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub mod aws;
pub mod docker;
pub mod externals;
pub mod git;
pub mod kubernetes;
pub mod terraform;

/// Outputs of a job, keyed by output name
pub type Outputs = BTreeMap<String, String>;

/// The operation being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Preview changes
    Diff,
    /// Make changes
    Apply,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Diff => f.write_str("diff"),
            Op::Apply => f.write_str("apply"),
        }
    }
}

impl FromStr for Op {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "diff" => Ok(Op::Diff),
            "apply" => Ok(Op::Apply),
            other => Err(Error::Output(format!("unsupported op {:?}", other))),
        }
    }
}

/// A reference to another job's output, written `<job>.<key>`
///
/// The job part is a sibling name or an absolute id; it is split off at the
/// first dot, so keys may contain dots but job names may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    /// Job reference as written
    pub job: String,
    /// Output key
    pub key: String,
}

impl OutputRef {
    /// Parse a `<job>.<key>` reference
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('.') {
            Some((job, key)) if !job.is_empty() && !key.is_empty() => Ok(Self {
                job: job.to_string(),
                key: key.to_string(),
            }),
            _ => Err(Error::MalformedOutputRef(raw.to_string())),
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.job, self.key)
    }
}

/// A command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Passed as-is
    Literal(String),
    /// `prefix` followed by the value of another job's output
    Output {
        /// Text placed before the value, e.g. `name=`
        prefix: String,
        /// The referenced output
        reference: OutputRef,
    },
}

/// A command of a step, before output references are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    /// Short descriptive name, e.g. `terraform-plan`
    pub name: String,
    /// Program to execute
    pub program: String,
    /// Arguments
    pub args: Vec<Arg>,
    /// Working directory
    pub dir: PathBuf,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
}

impl Cmd {
    /// Create a command running `program` in `dir`
    pub fn new(name: impl Into<String>, program: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            dir: dir.as_ref().to_path_buf(),
            env: BTreeMap::new(),
        }
    }

    /// Append a literal argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Literal(arg.into()));
        self
    }

    /// Append literal arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|arg| Arg::Literal(arg.into())));
        self
    }

    /// Append an argument built from `prefix` and the output `reference`
    pub fn output_arg(mut self, prefix: impl Into<String>, reference: &str) -> Result<Self> {
        self.args.push(Arg::Output {
            prefix: prefix.into(),
            reference: OutputRef::parse(reference)?,
        });
        Ok(self)
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Run a step only if an output collected so far has a given value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfOutputEq {
    /// Output key
    pub key: String,
    /// Required value
    pub value: String,
}

/// Produces outputs for a job
#[async_trait]
pub trait OutputCollector: Send + Sync {
    /// Add this collector's outputs to `outputs`
    async fn collect(&self, ctx: &CollectContext<'_>, op: Op, outputs: &mut Outputs) -> Result<()>;
}

type Resolver<'a> = dyn Fn(&OutputRef) -> Result<String> + Send + Sync + 'a;

/// What a collector may use while collecting
pub struct CollectContext<'a> {
    /// Runtime for any commands the collector needs
    pub runtime: &'a dyn Runtime,
    /// The job being collected
    pub job: &'a JobId,
    resolver: &'a Resolver<'a>,
}

impl<'a> CollectContext<'a> {
    /// Create a context resolving output references with `resolver`
    pub fn new(runtime: &'a dyn Runtime, job: &'a JobId, resolver: &'a Resolver<'a>) -> Self {
        Self {
            runtime,
            job,
            resolver,
        }
    }

    /// Resolve another job's output as seen from this job
    pub fn resolve(&self, reference: &OutputRef) -> Result<String> {
        (self.resolver)(reference)
    }
}

/// One guarded unit of a job's diff or apply sequence
#[derive(Clone, Default)]
pub struct Step {
    /// Descriptive name
    pub name: String,
    /// Guard evaluated against the outputs collected so far
    pub if_output_eq: Option<IfOutputEq>,
    /// Commands run in order
    pub run: Vec<Cmd>,
    /// Collector invoked after the commands succeed
    pub collector: Option<Arc<dyn OutputCollector>>,
}

impl Step {
    /// Create an empty step
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A step running a single command
    pub fn cmd(cmd: Cmd) -> Self {
        Self::new(cmd.name.clone()).run(cmd)
    }

    /// Only run when output `key` equals `value`
    pub fn when(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.if_output_eq = Some(IfOutputEq {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a command
    pub fn run(mut self, cmd: Cmd) -> Self {
        self.run.push(cmd);
        self
    }

    /// Collect outputs after the commands
    pub fn collect(mut self, collector: impl OutputCollector + 'static) -> Self {
        self.collector = Some(Arc::new(collector));
        self
    }

    /// Whether the guard, if any, is satisfied by `outputs`
    ///
    /// A guard on a key that has not been collected is never satisfied.
    pub fn guard_passes(&self, outputs: &Outputs) -> bool {
        match &self.if_output_eq {
            Some(guard) => outputs.get(&guard.key) == Some(&guard.value),
            None => true,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("if_output_eq", &self.if_output_eq)
            .field("run", &self.run)
            .field("collector", &self.collector.is_some())
            .finish()
    }
}

/// The diff/apply contract of one job
#[derive(Clone, Default)]
pub struct Driver {
    /// Driver kind, e.g. `docker`
    pub kind: &'static str,
    /// Steps run by `diff`
    pub diff: Vec<Step>,
    /// Steps run by `apply`
    pub apply: Vec<Step>,
    /// Collector run after all steps of either operation
    pub collector: Option<Arc<dyn OutputCollector>>,
}

impl Driver {
    /// A driver without steps or outputs
    pub fn empty(kind: &'static str) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Steps for `op`
    pub fn steps(&self, op: Op) -> &[Step] {
        match op {
            Op::Diff => &self.diff,
            Op::Apply => &self.apply,
        }
    }

    /// Set the top-level collector
    pub fn with_collector(mut self, collector: impl OutputCollector + 'static) -> Self {
        self.collector = Some(Arc::new(collector));
        self
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("kind", &self.kind)
            .field("diff", &self.diff)
            .field("apply", &self.apply)
            .field("collector", &self.collector.is_some())
            .finish()
    }
}

/// Build the driver for a component in `dir`
///
/// `None` yields the empty driver of a grouping component.
pub fn new_driver(id: &JobId, dir: &Path, config: Option<&DriverConfig>) -> Result<Driver> {
    let invalid = |e: Error| match e {
        Error::MalformedOutputRef(_) | Error::Output(_) => Error::InvalidComponent {
            id: id.to_string(),
            reason: e.to_string(),
        },
        other => other,
    };

    let driver = match config {
        None => Driver::empty("group"),
        Some(DriverConfig::Noop) => Driver::empty("noop"),
        Some(DriverConfig::Aws(aws)) => aws::driver(dir, aws),
        Some(DriverConfig::Docker(docker)) => docker::driver(dir, docker).map_err(invalid)?,
        Some(DriverConfig::Terraform(terraform)) => {
            terraform::driver(dir, terraform).map_err(invalid)?
        }
        Some(DriverConfig::Kubernetes(kubernetes)) => {
            kubernetes::driver(dir, kubernetes).map_err(invalid)?
        }
        Some(DriverConfig::Externals(externals)) => externals::driver(dir, externals),
    };
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_ref_parse() {
        let reference = OutputRef::parse("image.tag").unwrap();
        assert_eq!(reference.job, "image");
        assert_eq!(reference.key, "tag");

        let reference = OutputRef::parse("/infra/vpc.outputs.id").unwrap();
        assert_eq!(reference.job, "/infra/vpc");
        assert_eq!(reference.key, "outputs.id");
        assert_eq!(reference.to_string(), "/infra/vpc.outputs.id");

        for malformed in ["image", "image.", ".tag", ""] {
            assert!(matches!(
                OutputRef::parse(malformed),
                Err(Error::MalformedOutputRef(_))
            ));
        }
    }

    #[test]
    fn test_guard() {
        let mut outputs = Outputs::new();
        let step = Step::new("push").when("buildx", "true");
        assert!(!step.guard_passes(&outputs));

        outputs.insert("buildx".to_string(), "false".to_string());
        assert!(!step.guard_passes(&outputs));

        outputs.insert("buildx".to_string(), "true".to_string());
        assert!(step.guard_passes(&outputs));
        assert!(Step::new("unguarded").guard_passes(&Outputs::new()));
    }

    #[test]
    fn test_op_from_str() {
        assert_eq!("diff".parse::<Op>().unwrap(), Op::Diff);
        assert_eq!("apply".parse::<Op>().unwrap(), Op::Apply);
        assert!("destroy".parse::<Op>().is_err());
        assert_eq!(Op::Apply.to_string(), "apply");
    }

    #[test]
    fn test_group_driver_is_empty() {
        let driver = new_driver(&JobId::new("app"), Path::new("."), None).unwrap();
        assert_eq!(driver.kind, "group");
        assert!(driver.steps(Op::Diff).is_empty());
        assert!(driver.steps(Op::Apply).is_empty());
        assert!(driver.collector.is_none());
    }
}
