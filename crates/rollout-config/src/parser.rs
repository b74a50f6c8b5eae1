//! Configuration file parsing and validation

use crate::{
    Component, ConfigError, Docker, DriverConfig, Externals, Kubernetes, OutputFrom, Result,
    Terraform, environment::validate_environments,
};
use std::path::{Path, PathBuf};

/// File names looked up by [`discover`], in order
pub const CONFIG_FILE_NAMES: [&str; 3] = ["rollout.yaml", "rollout.yml", "rollout.json"];

/// Find the configuration file in `dir`
///
/// Exactly one of [`CONFIG_FILE_NAMES`] must exist.
pub fn discover(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let found: Vec<PathBuf> = CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    match found.as_slice() {
        [path] => Ok(path.clone()),
        [] => Err(ConfigError::NotFound {
            dir: dir.display().to_string(),
            candidates: CONFIG_FILE_NAMES.join(", "),
        }),
        _ => Err(ConfigError::Ambiguous(
            found
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )),
    }
}

/// Parse a configuration file, choosing the format by extension
///
/// When the root component has no `dir`, it defaults to the directory
/// containing the file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Component> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let mut config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => parse_str(&content)?,
        Some("json") => parse_json_str(&content)?,
        _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    };

    if config.dir.is_empty() {
        config.dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
            _ => ".".to_string(),
        };
    }

    Ok(config)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Component> {
    let config: Component = serde_yaml::from_str(content)?;
    validate_environments(&config)?;
    Ok(config)
}

/// Parse JSON configuration from a string
pub fn parse_json_str(content: &str) -> Result<Component> {
    let config: Component = serde_json::from_str(content)?;
    validate_environments(&config)?;
    Ok(config)
}

/// Validate an environment-resolved tree
///
/// Every component below the root needs a driver or children, never more
/// than one driver, and the fields its driver requires.
pub fn validate_config(config: &Component) -> Result<()> {
    validate_environments(config)?;

    if config.components.is_empty() && config.driver_kinds().is_empty() {
        return Err(ConfigError::ValidationError(
            "configuration does not define any components".to_string(),
        ));
    }

    validate_component("", config)
}

fn validate_component(path: &str, component: &Component) -> Result<()> {
    let invalid = |msg: String| {
        let name = if path.is_empty() { "/" } else { path };
        ConfigError::ValidationError(format!("component '{}': {}", name, msg))
    };

    let driver = component.driver().map_err(|e| match e {
        ConfigError::ValidationError(msg) => invalid(msg),
        other => other,
    })?;

    match &driver {
        None if !path.is_empty() && component.components.is_empty() => {
            return Err(invalid(format!(
                "component does not have any of {} fields or sub-components",
                crate::DRIVER_KEYS.join(", ")
            )));
        }
        Some(DriverConfig::Aws(aws)) if aws.account.is_empty() => {
            return Err(invalid("aws.account must be set".to_string()));
        }
        Some(DriverConfig::Docker(docker)) => validate_docker(docker).map_err(invalid)?,
        Some(DriverConfig::Terraform(terraform)) => {
            validate_terraform(terraform).map_err(invalid)?
        }
        Some(DriverConfig::Kubernetes(kubernetes)) => {
            validate_kubernetes(kubernetes).map_err(invalid)?
        }
        Some(DriverConfig::Externals(externals)) => {
            validate_externals(externals).map_err(invalid)?
        }
        _ => {}
    }

    for (name, child) in &component.components {
        validate_component(&format!("{}/{}", path, name), child)?;
    }
    Ok(())
}

fn validate_docker(docker: &Docker) -> std::result::Result<(), String> {
    if docker.image.is_empty() {
        return Err("docker.image must be set".to_string());
    }
    Ok(())
}

fn validate_terraform(terraform: &Terraform) -> std::result::Result<(), String> {
    for var in &terraform.vars {
        if var.name.is_empty() {
            return Err("terraform var is missing a name".to_string());
        }
        if var.value.is_empty() && var.value_from.is_empty() {
            return Err(format!(
                "terraform var '{}' needs either value or valueFrom",
                var.name
            ));
        }
    }
    Ok(())
}

fn validate_kubernetes(kubernetes: &Kubernetes) -> std::result::Result<(), String> {
    if kubernetes.path.is_empty() {
        return Err("kubernetes.path must be set".to_string());
    }
    if !kubernetes.images.is_empty() && !kubernetes.kustomize {
        return Err("kubernetes.images requires kustomize".to_string());
    }
    for image in &kubernetes.images {
        if image.name.is_empty() || image.new_tag_from.is_empty() {
            return Err("kubernetes image needs name and newTagFrom".to_string());
        }
    }
    Ok(())
}

fn validate_externals(externals: &Externals) -> std::result::Result<(), String> {
    for (name, output) in &externals.outputs {
        validate_output_from(output).map_err(|e| format!("external output '{}': {}", name, e))?;
    }
    Ok(())
}

/// Check that exactly one source is set and that it is complete
pub fn validate_output_from(output: &OutputFrom) -> std::result::Result<(), String> {
    let set = [
        output.aws_param.is_some(),
        output.aws_secret.is_some(),
        output.terraform_state.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if set != 1 {
        return Err("exactly one of awsParam, awsSecret or terraformState must be set".to_string());
    }

    if let Some(param) = &output.aws_param {
        if param.name.is_empty() {
            return Err("awsParam.name must be set".to_string());
        }
    }

    if let Some(secret) = &output.aws_secret {
        if secret.id.is_empty() && secret.arn.is_empty() {
            return Err("either awsSecret.id or awsSecret.arn must be set".to_string());
        }
    }

    if let Some(state) = &output.terraform_state {
        match (state.path.is_empty(), state.url.is_empty()) {
            (true, true) => return Err("either path or url must be set".to_string()),
            (false, false) => return Err("path and url are mutually exclusive".to_string()),
            _ => {}
        }
        if !state.path.is_empty() && !state.path.ends_with(".tfstate") {
            return Err("path must end with .tfstate".to_string());
        }
        if !state.url.is_empty()
            && !state.url.starts_with("s3://")
            && !state.url.starts_with("gs://")
        {
            return Err("url must start with s3:// or gs://".to_string());
        }
        if state.expr.is_empty() {
            return Err("expr must be set".to_string());
        }
    }

    Ok(())
}
