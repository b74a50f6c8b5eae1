use super::{SkipArgs, load_workflow};
use anyhow::{Context, Result};
use rollout_core::{Interpreter, LocalRuntime, Op, RunOptions};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    env: Option<&str>,
    target: &str,
    op: &str,
    skip: &SkipArgs,
) -> Result<()> {
    let op: Op = op.parse()?;
    let workflow = load_workflow(config_path, env, skip)?;
    let runtime = LocalRuntime::new();

    let outputs = Interpreter::new(&workflow, &runtime, RunOptions::default())
        .collect_outputs(target, op)
        .await
        .with_context(|| format!("Failed to collect outputs of {}", target))?;

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}
