use super::{RunArgs, load_workflow};
use anyhow::{Context, Result};
use rollout_core::{Interpreter, LocalRuntime};
use std::path::Path;
use tracing::info;

pub async fn run(config_path: Option<&Path>, env: Option<&str>, args: &RunArgs) -> Result<()> {
    let workflow = load_workflow(config_path, env, &args.skip)?;
    let runtime = LocalRuntime::new();

    let report = Interpreter::new(&workflow, &runtime, args.options())
        .diff()
        .await
        .context("Diff failed")?;

    info!("Diff completed for {} jobs", report.0.len());
    Ok(())
}
