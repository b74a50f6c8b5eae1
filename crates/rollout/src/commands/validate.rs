use super::load_config;
use anyhow::{Context, Result};
use rollout_config::environment;
use rollout_core::{JobKind, LoadOptions, Workflow};
use std::path::Path;

pub fn run(config_path: Option<&Path>, env: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let workflow = Workflow::load(
        &config,
        &LoadOptions {
            env: env.map(str::to_string),
            ..Default::default()
        },
    )
    .context("Configuration is invalid")?;

    let groups = workflow
        .jobs
        .values()
        .filter(|job| job.kind == JobKind::Group)
        .count();

    println!("✓ Configuration valid");
    if let Some(env) = env {
        println!("  Environment: {}", env);
    }
    println!("  Jobs: {} ({} groups)", workflow.jobs.len(), groups);
    println!("  Phases: {}", workflow.plan.len());

    let environments = environment::environment_names(&config);
    if !environments.is_empty() {
        let names: Vec<&str> = environments.iter().map(String::as_str).collect();
        println!("  Environments: {}", names.join(", "));
    }

    Ok(())
}
