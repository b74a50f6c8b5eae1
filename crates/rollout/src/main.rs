//! rollout - plan and run declarative multi-component deployments

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

use commands::{RunArgs, SkipArgs};

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Plan and run declarative multi-component deployments")]
#[command(version)]
struct Cli {
    /// Configuration file path (rollout.yaml, rollout.yml or rollout.json in
    /// the current directory when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment to apply to the configuration
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and the dependency graph
    Validate,

    /// Print the execution phases
    Plan {
        #[command(flatten)]
        skip: SkipArgs,
    },

    /// Preview the changes every component would make
    Diff {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Deploy every component and print their outputs as JSON
    Apply {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the outputs of a single component without deploying anything
    Output {
        /// Component to collect outputs from
        #[arg(long)]
        target: String,

        /// Operation the outputs are collected for (diff or apply)
        #[arg(long, default_value = "diff")]
        op: String,

        #[command(flatten)]
        skip: SkipArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        config,
        env,
        command,
        ..
    } = cli;
    let config = config.as_deref();
    let env = env.as_deref();

    smol::block_on(async move {
        match command {
            Commands::Validate => commands::validate::run(config, env),
            Commands::Plan { skip } => commands::plan::run(config, env, &skip),
            Commands::Diff { run } => commands::diff::run(config, env, &run).await,
            Commands::Apply { run } => commands::apply::run(config, env, &run).await,
            Commands::Output { target, op, skip } => {
                commands::output::run(config, env, &target, &op, &skip).await
            }
        }
    })
}
