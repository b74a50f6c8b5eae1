//! Environment resolution
//!
//! An environment declared on a component applies to that component's
//! direct children, in this order:
//!
//! 1. `defaults` are merged under the child (the child wins on conflict)
//! 2. `uses` replaces the child entirely, or `overrides` is merged on top
//!
//! Merging operates on the serialized form of the components: objects merge
//! key by key, anything else in the overlay replaces the base value.

use crate::{Component, ConfigError, DRIVER_KEYS, Result, parser::validate_config};
use serde_json::Value;
use std::collections::BTreeSet;

/// Merge `overlay` into `base`
///
/// Nested objects are merged recursively. Scalars and arrays in the overlay
/// replace the corresponding base value; keys absent from the overlay leave
/// the base untouched.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Merge `overlay` on top of `base`, returning the combined component
///
/// A driver set in the overlay switches the driver kind: driver kinds of the
/// base that the overlay does not mention are dropped.
pub fn merge(base: &Component, overlay: &Component) -> Result<Component> {
    let mut merged = serde_json::to_value(base)?;
    let overlay = serde_json::to_value(overlay)?;

    if let (Value::Object(merged), Value::Object(overlay)) = (&mut merged, &overlay) {
        if DRIVER_KEYS.iter().any(|key| overlay.contains_key(*key)) {
            for key in DRIVER_KEYS {
                if !overlay.contains_key(key) {
                    merged.remove(key);
                }
            }
        }
    }

    merge_values(&mut merged, overlay);
    Ok(serde_json::from_value(merged)?)
}

/// All environment names declared anywhere in the tree
pub fn environment_names(config: &Component) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = config.environments.keys().cloned().collect();
    for child in config.components.values() {
        names.extend(environment_names(child));
    }
    names
}

/// Apply `env` to the whole tree and validate the result
///
/// With no environment the tree is only validated. Requesting an environment
/// that no component declares is an error.
pub fn resolve(config: &Component, env: Option<&str>) -> Result<Component> {
    if let Some(env) = env {
        if !environment_names(config).contains(env) {
            return Err(ConfigError::EnvironmentNotFound(env.to_string()));
        }
    }

    let resolved = resolve_node(config, env)?;
    validate_config(&resolved)?;
    Ok(resolved)
}

fn resolve_node(node: &Component, env: Option<&str>) -> Result<Component> {
    let environment = env.and_then(|name| node.environments.get(name));

    let mut resolved = node.clone();
    for (name, child) in resolved.components.iter_mut() {
        let mut effective = child.clone();

        if let Some(environment) = environment {
            if let Some(defaults) = &environment.defaults {
                effective = merge(defaults, &effective)?;
            }
            if let Some(replacement) = environment.uses.get(name) {
                effective = replacement.clone();
            } else if let Some(patch) = environment.overrides.get(name) {
                effective = merge(&effective, patch)?;
            }
        }

        *child = resolve_node(&effective, env)?;
    }

    Ok(resolved)
}

/// Check every environment in the tree for internal consistency
///
/// `uses` and `overrides` may only name existing children, and never the
/// same child twice.
pub fn validate_environments(config: &Component) -> Result<()> {
    for (env_name, environment) in &config.environments {
        for name in environment.uses.keys().chain(environment.overrides.keys()) {
            if !config.components.contains_key(name) {
                return Err(ConfigError::UnknownComponent {
                    environment: env_name.clone(),
                    component: name.clone(),
                });
            }
        }

        if let Some(name) = environment
            .uses
            .keys()
            .find(|name| environment.overrides.contains_key(*name))
        {
            return Err(ConfigError::ValidationError(format!(
                "environment '{}' sets both uses and overrides for component '{}'",
                env_name, name
            )));
        }
    }

    for child in config.components.values() {
        validate_environments(child)?;
    }
    Ok(())
}
