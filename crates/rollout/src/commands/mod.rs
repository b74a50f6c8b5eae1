pub mod apply;
pub mod diff;
pub mod output;
pub mod plan;
pub mod validate;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use rollout_config::{Component, parser};
use rollout_core::{LoadOptions, Outputs, RunOptions, Workflow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Flags selecting jobs to skip
#[derive(Args, Debug, Clone, Default)]
pub struct SkipArgs {
    /// Jobs to skip, comma-separated or repeated
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Outputs of the skipped jobs, as a JSON object of job -> outputs
    #[arg(long, value_name = "JSON")]
    pub skipped_jobs_outputs: Option<String>,
}

/// Flags shared by diff and apply
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub skip: SkipArgs,

    /// Environment variable set on every command
    #[arg(long = "set-env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set_env: Vec<(String, String)>,

    /// Run the jobs of each phase one after another
    #[arg(long)]
    pub sequential: bool,

    /// List all available outputs when a reference cannot be resolved
    #[arg(long)]
    pub debug: bool,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            sequential: self.sequential,
            debug: self.debug,
            env: self.set_env.iter().cloned().collect(),
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {:?}", raw))?;
    if key.is_empty() {
        return Err(anyhow!("empty variable name in {:?}", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_skipped_outputs(raw: Option<&str>) -> Result<BTreeMap<String, Outputs>> {
    match raw {
        None => Ok(BTreeMap::new()),
        Some(json) => serde_json::from_str(json).context("Failed to parse --skipped-jobs-outputs"),
    }
}

/// Locate and parse the configuration
pub fn load_config(path: Option<&Path>) -> Result<Component> {
    let path: PathBuf = match path {
        Some(path) => path.to_path_buf(),
        None => parser::discover(".").context("Failed to find a configuration file")?,
    };
    info!("Using configuration {}", path.display());
    parser::parse_file(&path)
        .with_context(|| format!("Failed to parse configuration {}", path.display()))
}

/// Parse the configuration and build the execution plan
pub fn load_workflow(path: Option<&Path>, env: Option<&str>, skip: &SkipArgs) -> Result<Workflow> {
    let config = load_config(path)?;
    let options = LoadOptions {
        env: env.map(str::to_string),
        skip: skip.skip.clone(),
        skipped_jobs_outputs: parse_skipped_outputs(skip.skipped_jobs_outputs.as_deref())?,
    };
    Workflow::load(&config, &options).context("Failed to load workflow")
}
