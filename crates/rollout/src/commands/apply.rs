use super::{RunArgs, load_workflow};
use anyhow::{Context, Result};
use rollout_core::{Interpreter, LocalRuntime};
use std::path::Path;
use tracing::info;

pub async fn run(config_path: Option<&Path>, env: Option<&str>, args: &RunArgs) -> Result<()> {
    let workflow = load_workflow(config_path, env, &args.skip)?;
    let runtime = LocalRuntime::new();

    let report = Interpreter::new(&workflow, &runtime, args.options())
        .apply()
        .await
        .context("Apply failed")?;

    info!("Applied {} jobs", report.0.len());
    println!("{}", report.to_json_pretty()?);
    Ok(())
}
