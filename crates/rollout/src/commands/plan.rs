use super::{SkipArgs, load_workflow};
use anyhow::Result;
use rollout_core::workflow::format_phase;
use std::path::Path;

pub fn run(config_path: Option<&Path>, env: Option<&str>, skip: &SkipArgs) -> Result<()> {
    let workflow = load_workflow(config_path, env, skip)?;

    for (i, phase) in workflow.plan.iter().enumerate() {
        println!("Phase {}: {}", i + 1, format_phase(phase));
    }
    Ok(())
}
