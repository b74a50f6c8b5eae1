//! # Rollout Configuration
//!
//! Configuration model for rollout deployments.
//!
//! A deployment is described as a tree of [`Component`]s. Every component is
//! either backed by exactly one driver (docker, terraform, kubernetes, ...)
//! or groups further components. Environments layer per-environment
//! defaults, replacements and patches on top of the tree before it is
//! turned into an execution plan.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod environment;
pub mod parser;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Failed to parse JSON
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The requested environment is not declared anywhere in the tree
    #[error("Environment '{0}' not found")]
    EnvironmentNotFound(String),

    /// An environment refers to a component that does not exist
    #[error("Environment '{environment}' refers to undefined component '{component}'")]
    UnknownComponent {
        /// Environment name
        environment: String,
        /// Component name referenced by `uses` or `overrides`
        component: String,
    },

    /// No configuration file could be found
    #[error("No config file found in {dir}, expected one of: {candidates}")]
    NotFound {
        /// Directory that was searched
        dir: String,
        /// File names that were tried
        candidates: String,
    },

    /// More than one configuration file was found
    #[error("Multiple config files found: {0}")]
    Ambiguous(String),

    /// The file extension is not a known configuration format
    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A node of the deployment tree
///
/// Fields left empty are omitted on serialization so that a component can be
/// used as a partial patch when merged over another one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Working directory, relative to the parent's directory unless absolute
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    /// Child components keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, Component>,

    /// Components this one depends on, as sibling names or absolute ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    /// AWS account check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<Aws>,

    /// Container image build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<Docker>,

    /// Terraform plan/apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform: Option<Terraform>,

    /// Kubernetes manifest apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<Kubernetes>,

    /// Externally stored parameters and secrets exposed as outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externals: Option<Externals>,

    /// Placeholder that does nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noop: Option<Noop>,

    /// Per-environment settings for the children of this component
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Environment>,
}

/// Serialized keys of the driver fields of [`Component`]
pub const DRIVER_KEYS: [&str; 6] = ["aws", "docker", "terraform", "kubernetes", "externals", "noop"];

/// The single driver a component is backed by
#[derive(Debug, Clone, PartialEq)]
pub enum DriverConfig {
    /// AWS account check
    Aws(Aws),
    /// Container image build
    Docker(Docker),
    /// Terraform plan/apply
    Terraform(Terraform),
    /// Kubernetes manifest apply
    Kubernetes(Kubernetes),
    /// External parameters and secrets
    Externals(Externals),
    /// Does nothing
    Noop,
}

impl DriverConfig {
    /// Short name of the driver kind
    pub fn kind(&self) -> &'static str {
        match self {
            DriverConfig::Aws(_) => "aws",
            DriverConfig::Docker(_) => "docker",
            DriverConfig::Terraform(_) => "terraform",
            DriverConfig::Kubernetes(_) => "kubernetes",
            DriverConfig::Externals(_) => "externals",
            DriverConfig::Noop => "noop",
        }
    }
}

impl Component {
    /// Names of all driver kinds set on this component
    pub fn driver_kinds(&self) -> Vec<&'static str> {
        let set = [
            self.aws.is_some(),
            self.docker.is_some(),
            self.terraform.is_some(),
            self.kubernetes.is_some(),
            self.externals.is_some(),
            self.noop.is_some(),
        ];
        DRIVER_KEYS
            .iter()
            .zip(set)
            .filter_map(|(key, set)| set.then_some(*key))
            .collect()
    }

    /// The driver backing this component, or `None` for a pure grouping node
    pub fn driver(&self) -> Result<Option<DriverConfig>> {
        let kinds = self.driver_kinds();
        if kinds.len() > 1 {
            return Err(ConfigError::ValidationError(format!(
                "component has more than one driver: {}",
                kinds.join(", ")
            )));
        }

        let driver = if let Some(aws) = &self.aws {
            Some(DriverConfig::Aws(aws.clone()))
        } else if let Some(docker) = &self.docker {
            Some(DriverConfig::Docker(docker.clone()))
        } else if let Some(terraform) = &self.terraform {
            Some(DriverConfig::Terraform(terraform.clone()))
        } else if let Some(kubernetes) = &self.kubernetes {
            Some(DriverConfig::Kubernetes(kubernetes.clone()))
        } else if let Some(externals) = &self.externals {
            Some(DriverConfig::Externals(externals.clone()))
        } else {
            self.noop.as_ref().map(|_| DriverConfig::Noop)
        };
        Ok(driver)
    }
}

/// Environment-specific settings applied to the children of a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Merged under every child; the child's own settings win
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Box<Component>>,

    /// Children replaced entirely in this environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub uses: BTreeMap<String, Component>,

    /// Patches merged on top of children in this environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, Component>,
}

/// Verifies the current AWS credentials belong to an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aws {
    /// Expected account id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
}

/// Container image build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docker {
    /// Image name, without tag
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Path to the Dockerfile
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,

    /// Static build args
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,

    /// Build args taken from other components' outputs (`job.key`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args_from: BTreeMap<String, String>,

    /// Image tags taken from other components' outputs (`job.key`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags_from: Vec<String>,
}

/// Terraform configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Terraform {
    /// Resource address passed as `-target`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,

    /// Input variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Var>,
}

/// A terraform input variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Var {
    /// Variable name
    pub name: String,

    /// Literal value
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    /// Value taken from another component's output (`job.key`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value_from: String,
}

/// Kubernetes manifests applied with kubectl
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubernetes {
    /// Manifest file or directory, relative to the component directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Treat `path` as a kustomization directory
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub kustomize: bool,

    /// Namespace passed to kubectl
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Kubeconfig context passed to kubectl
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,

    /// Image overrides written into the kustomization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<KustomizeImage>,
}

/// An image override for `kustomize edit set image`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizeImage {
    /// Image name as it appears in the manifests
    pub name: String,

    /// Replacement image name; defaults to `name`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_name: String,

    /// Tag taken from another component's output (`job.key`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_tag_from: String,
}

/// External values exposed as outputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Externals {
    /// Output name to the location of its value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputFrom>,
}

/// Where an external output is read from; exactly one must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFrom {
    /// AWS SSM parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_param: Option<AwsParam>,

    /// AWS Secrets Manager secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret: Option<AwsSecret>,

    /// Value from a terraform state file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_state: Option<TerraformState>,
}

/// A reference to an AWS SSM parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsParam {
    /// Parameter name
    #[serde(default)]
    pub name: String,

    /// Region override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// Named AWS profile
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,
}

/// A reference to an AWS Secrets Manager secret
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSecret {
    /// Secret name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Secret ARN
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arn: String,

    /// Slash-separated key path into the JSON-decoded secret
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Pinned secret version
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "versionID")]
    pub version_id: String,

    /// Region override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// Named AWS profile
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,
}

/// A value read out of a terraform state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerraformState {
    /// Local `.tfstate` file, relative to the component directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Remote state object, `s3://` or `gs://`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Dot-notation expression, e.g. `output.vpc_id`
    #[serde(default)]
    pub expr: String,
}

/// Marker for components that do nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Noop {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_selection() {
        let component = Component {
            docker: Some(Docker {
                image: "app".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(component.driver_kinds(), ["docker"]);
        assert!(matches!(
            component.driver().unwrap(),
            Some(DriverConfig::Docker(ref d)) if d.image == "app"
        ));
    }

    #[test]
    fn test_multiple_drivers_rejected() {
        let component = Component {
            noop: Some(Noop {}),
            aws: Some(Aws::default()),
            ..Default::default()
        };
        let err = component.driver().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: component has more than one driver: aws, noop"
        );
    }

    #[test]
    fn test_group_component() {
        let mut component = Component::default();
        component
            .components
            .insert("child".to_string(), Component::default());
        assert!(component.driver_kinds().is_empty());
        assert_eq!(component.driver().unwrap(), None);
    }

    #[test]
    fn test_empty_fields_not_serialized() {
        let component = Component {
            needs: vec!["image".to_string()],
            noop: Some(Noop {}),
            ..Default::default()
        };
        let value = serde_json::to_value(&component).unwrap();
        assert_eq!(value, serde_json::json!({"needs": ["image"], "noop": {}}));
    }
}
