//! Terraform plan/apply

use super::{CollectContext, Cmd, Driver, Op, OutputCollector, Outputs, Step};
use crate::{Error, Result};
use async_trait::async_trait;
use command_executor::Command;
use rollout_config::Terraform;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Output holding the unparsed `terraform output -json` document
pub const RAW_OUTPUT: &str = "_raw";

/// Driver running terraform in `dir`
pub fn driver(dir: &Path, config: &Terraform) -> Result<Driver> {
    let with_args = |mut cmd: Cmd| -> Result<Cmd> {
        if !config.target.is_empty() {
            cmd = cmd.args(["-target", config.target.as_str()]);
        }
        for var in &config.vars {
            cmd = cmd.arg("-var");
            cmd = if !var.value_from.is_empty() {
                cmd.output_arg(format!("{}=", var.name), &var.value_from)?
            } else if !var.value.is_empty() {
                cmd.arg(format!("{}={}", var.name, var.value))
            } else {
                return Err(Error::Output(format!(
                    "invalid var {:?}: it must have either value or valueFrom",
                    var.name
                )));
            };
        }
        Ok(cmd)
    };

    let init = Step::cmd(Cmd::new("terraform-init", "terraform", dir).args(["init", "-input=false"]));

    let plan = with_args(Cmd::new("terraform-plan", "terraform", dir).args(["plan", "-input=false"]))?;
    let apply = with_args(
        Cmd::new("terraform-apply", "terraform", dir).args(["apply", "-input=false", "-auto-approve"]),
    )?;

    Ok(Driver {
        kind: "terraform",
        diff: vec![init.clone(), Step::cmd(plan)],
        apply: vec![init, Step::cmd(apply)],
        collector: None,
    }
    .with_collector(TerraformOutputs {
        dir: dir.to_path_buf(),
    }))
}

#[derive(Deserialize)]
struct TerraformOutput {
    #[serde(rename = "type")]
    kind: Value,
    value: Value,
}

/// Flatten `terraform output -json` into string outputs
///
/// Only strings, numbers and booleans are supported.
pub fn parse_outputs(json: &str) -> Result<Outputs> {
    let parsed: BTreeMap<String, TerraformOutput> = serde_json::from_str(json)
        .map_err(|e| Error::Output(format!("unable to decode terraform outputs: {}", e)))?;

    let mut outputs = Outputs::new();
    for (name, output) in parsed {
        let value = match output.value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(Error::Output(format!(
                    "unable to unmarshal terraform output {:?} of type {}",
                    name, output.kind
                )));
            }
        };
        outputs.insert(name, value);
    }
    outputs.insert(RAW_OUTPUT.to_string(), json.to_string());
    Ok(outputs)
}

struct TerraformOutputs {
    dir: PathBuf,
}

#[async_trait]
impl OutputCollector for TerraformOutputs {
    async fn collect(&self, ctx: &CollectContext<'_>, _op: Op, outputs: &mut Outputs) -> Result<()> {
        let json = ctx
            .runtime
            .output(
                Command::builder("terraform")
                    .args(["output", "-json"])
                    .current_dir(&self.dir)
                    .build(),
            )
            .await?;
        outputs.extend(parse_outputs(&json)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Arg, OutputRef};
    use rollout_config::Var;

    #[test]
    fn test_commands() {
        let config = Terraform {
            target: "module.vpc".to_string(),
            vars: vec![
                Var {
                    name: "region".to_string(),
                    value: "eu-west-1".to_string(),
                    value_from: String::new(),
                },
                Var {
                    name: "image_id".to_string(),
                    value: String::new(),
                    value_from: "image.id".to_string(),
                },
            ],
        };
        let driver = driver(Path::new("infra"), &config).unwrap();

        assert_eq!(driver.diff.len(), 2);
        assert_eq!(driver.diff[0].run[0].name, "terraform-init");

        let apply = &driver.apply[1].run[0];
        assert_eq!(
            apply.args,
            [
                Arg::Literal("apply".to_string()),
                Arg::Literal("-input=false".to_string()),
                Arg::Literal("-auto-approve".to_string()),
                Arg::Literal("-target".to_string()),
                Arg::Literal("module.vpc".to_string()),
                Arg::Literal("-var".to_string()),
                Arg::Literal("region=eu-west-1".to_string()),
                Arg::Literal("-var".to_string()),
                Arg::Output {
                    prefix: "image_id=".to_string(),
                    reference: OutputRef::parse("image.id").unwrap(),
                },
            ]
        );
    }

    #[test]
    fn test_var_without_value() {
        let config = Terraform {
            target: String::new(),
            vars: vec![Var {
                name: "region".to_string(),
                ..Default::default()
            }],
        };
        assert!(driver(Path::new("."), &config).is_err());
    }

    #[test]
    fn test_parse_outputs() {
        let json = r#"{
            "vpc_id": {"sensitive": false, "type": "string", "value": "vpc-123"},
            "replicas": {"sensitive": false, "type": "number", "value": 3},
            "public": {"sensitive": false, "type": "bool", "value": true}
        }"#;
        let outputs = parse_outputs(json).unwrap();
        assert_eq!(outputs["vpc_id"], "vpc-123");
        assert_eq!(outputs["replicas"], "3");
        assert_eq!(outputs["public"], "true");
        assert_eq!(outputs[RAW_OUTPUT], json);
    }

    #[test]
    fn test_parse_outputs_rejects_collections() {
        let json = r#"{"subnets": {"sensitive": false, "type": ["list", "string"], "value": ["a"]}}"#;
        let err = parse_outputs(json).unwrap_err();
        assert!(err.to_string().contains(r#""subnets""#));
    }
}
