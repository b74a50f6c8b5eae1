//! External parameters and secrets exposed as outputs
//!
//! Nothing is deployed; the collector reads each configured value from SSM,
//! Secrets Manager or a terraform state and publishes it under its name.

use super::{CollectContext, Driver, Op, OutputCollector, Outputs};
use crate::{Error, Result};
use async_trait::async_trait;
use command_executor::Command;
use rollout_config::{AwsParam, AwsSecret, Externals, OutputFrom, TerraformState};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Driver publishing `config.outputs`
pub fn driver(dir: &Path, config: &Externals) -> Driver {
    Driver::empty("externals").with_collector(ExternalOutputs {
        dir: dir.to_path_buf(),
        outputs: config
            .outputs
            .iter()
            .map(|(name, from)| (name.clone(), from.clone()))
            .collect(),
    })
}

struct ExternalOutputs {
    dir: PathBuf,
    outputs: Vec<(String, OutputFrom)>,
}

#[async_trait]
impl OutputCollector for ExternalOutputs {
    async fn collect(&self, ctx: &CollectContext<'_>, _op: Op, outputs: &mut Outputs) -> Result<()> {
        for (name, from) in &self.outputs {
            debug!("Resolving external output {} of {}", name, ctx.job);
            let value = self
                .resolve(ctx, from)
                .await
                .map_err(|e| Error::Output(format!("external output {:?}: {}", name, e)))?;
            outputs.insert(name.clone(), value);
        }
        Ok(())
    }
}

impl ExternalOutputs {
    async fn resolve(&self, ctx: &CollectContext<'_>, from: &OutputFrom) -> Result<String> {
        if let Some(param) = &from.aws_param {
            let stdout = ctx.runtime.output(self.ssm_command(param)).await?;
            Ok(stdout.trim_end().to_string())
        } else if let Some(secret) = &from.aws_secret {
            let stdout = ctx.runtime.output(self.secret_command(secret)).await?;
            let secret_string = stdout.trim_end();
            if secret.path.is_empty() {
                return Ok(secret_string.to_string());
            }
            let document: Value = serde_json::from_str(secret_string)?;
            let segments: Vec<&str> = secret.path.split('/').filter(|s| !s.is_empty()).collect();
            lookup(&document, &segments)
                .map(value_to_string)
                .ok_or_else(|| Error::Output(format!("path {:?} not found in secret", secret.path)))
        } else if let Some(state) = &from.terraform_state {
            let content = self.read_state(ctx, state).await?;
            let document: Value = serde_json::from_str(&content)?;
            eval_state(&document, &state.expr)
        } else {
            Err(Error::Output(
                "it must have either awsParam, awsSecret or terraformState".to_string(),
            ))
        }
    }

    fn ssm_command(&self, param: &AwsParam) -> Command {
        let mut command = Command::new("aws");
        command
            .args(["ssm", "get-parameter", "--with-decryption"])
            .args(["--name", param.name.as_str()])
            .args(["--query", "Parameter.Value", "--output", "text"])
            .current_dir(&self.dir);
        aws_profile_args(&mut command, &param.region, &param.profile);
        command
    }

    fn secret_command(&self, secret: &AwsSecret) -> Command {
        let id = if secret.arn.is_empty() {
            &secret.id
        } else {
            &secret.arn
        };
        let mut command = Command::new("aws");
        command
            .args(["secretsmanager", "get-secret-value"])
            .args(["--secret-id", id.as_str()])
            .args(["--query", "SecretString", "--output", "text"])
            .current_dir(&self.dir);
        if !secret.version_id.is_empty() {
            command.args(["--version-id", secret.version_id.as_str()]);
        }
        aws_profile_args(&mut command, &secret.region, &secret.profile);
        command
    }

    async fn read_state(&self, ctx: &CollectContext<'_>, state: &TerraformState) -> Result<String> {
        if !state.path.is_empty() {
            return Ok(async_fs::read_to_string(self.dir.join(&state.path)).await?);
        }

        let command = if state.url.starts_with("gs://") {
            Command::builder("gsutil")
                .args(["cat", state.url.as_str()])
                .current_dir(&self.dir)
                .build()
        } else {
            Command::builder("aws")
                .args(["s3", "cp", state.url.as_str(), "-"])
                .current_dir(&self.dir)
                .build()
        };
        ctx.runtime.output(command).await
    }
}

fn aws_profile_args(command: &mut Command, region: &str, profile: &str) {
    if !region.is_empty() {
        command.args(["--region", region]);
    }
    if !profile.is_empty() {
        command.args(["--profile", profile]);
    }
}

fn lookup<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a dot-notation expression against a terraform state document
///
/// `output.NAME` reads a root module output. `TYPE.NAME.ATTR` and
/// `data.TYPE.NAME.ATTR` read an attribute of the first instance of a
/// managed or data resource.
pub fn eval_state(state: &Value, expr: &str) -> Result<String> {
    let segments: Vec<&str> = expr.split('.').collect();
    let not_found = || Error::Output(format!("expression {:?} not found in terraform state", expr));

    let value = match segments.as_slice() {
        ["output", name, rest @ ..] => {
            let output = lookup(state, &["outputs", *name, "value"]).ok_or_else(not_found)?;
            lookup(output, rest)
        }
        ["data", kind, name, rest @ ..] => find_resource(state, "data", kind, name)
            .and_then(|attributes| lookup(attributes, rest)),
        [kind, name, rest @ ..] => find_resource(state, "managed", kind, name)
            .and_then(|attributes| lookup(attributes, rest)),
        _ => None,
    };

    value.map(value_to_string).ok_or_else(not_found)
}

fn find_resource<'v>(state: &'v Value, mode: &str, kind: &str, name: &str) -> Option<&'v Value> {
    state
        .get("resources")?
        .as_array()?
        .iter()
        .find(|resource| {
            resource.get("mode").and_then(Value::as_str) == Some(mode)
                && resource.get("type").and_then(Value::as_str) == Some(kind)
                && resource.get("name").and_then(Value::as_str) == Some(name)
        })?
        .get("instances")?
        .get(0)?
        .get("attributes")
}
