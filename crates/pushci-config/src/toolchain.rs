//! Toolchain configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use pushci_core::toolchain::{ToolCommand, Toolchain};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Load a toolchain definition from a KDL file.
pub fn load_toolchain(path: impl AsRef<Path>) -> ConfigResult<Toolchain> {
    let content = std::fs::read_to_string(path)?;
    parse_toolchain(&content)
}

/// Parse a toolchain definition from KDL text.
///
/// Blocks that are left out fall back to the default Python toolchain. When
/// the `setup` block is given, `venv` must be declared explicitly to be used.
pub fn parse_toolchain(kdl: &str) -> ConfigResult<Toolchain> {
    let doc: KdlDocument = kdl.parse()?;
    let defaults = Toolchain::default();

    let mut name = String::new();
    let mut venv = None;
    let mut timeout = None;
    let mut env = HashMap::new();
    let mut setup = None;
    let mut lint = None;
    let mut test = None;

    for node in doc.nodes() {
        match node.name().value() {
            "toolchain" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("toolchain name".to_string()))?;
            }
            "venv" => {
                venv = Some(get_first_string_arg(node).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "venv".to_string(),
                        message: "expected a directory name".to_string(),
                    }
                })?);
            }
            "timeout" => {
                timeout = Some(parse_timeout(node)?);
            }
            "env" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let key = child.name().value().to_string();
                        if let Some(val) = get_first_string_arg(child) {
                            env.insert(key, val);
                        }
                    }
                }
            }
            "setup" => {
                setup = Some(parse_commands(node));
            }
            "lint" => {
                lint = Some(parse_required_commands(node, "lint")?);
            }
            "test" => {
                test = Some(parse_required_commands(node, "test")?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("toolchain name".to_string()));
    }

    if setup.is_none() && venv.is_none() {
        venv = defaults.venv;
    }

    Ok(Toolchain {
        name,
        venv,
        timeout,
        env,
        setup: setup.unwrap_or(defaults.setup),
        lint: lint.unwrap_or(defaults.lint),
        test: test.unwrap_or(defaults.test),
    })
}

fn parse_timeout(node: &KdlNode) -> ConfigResult<Duration> {
    let secs = get_first_integer_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        field: "timeout".to_string(),
        message: "expected a number of seconds".to_string(),
    })?;

    let secs = u64::try_from(secs)
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "timeout".to_string(),
            message: format!("must be a positive number of seconds, got {}", secs),
        })?;

    Ok(Duration::from_secs(secs))
}

fn parse_commands(node: &KdlNode) -> Vec<ToolCommand> {
    let mut commands = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() != "run" {
                continue;
            }
            if let Some(script) = get_first_string_arg(child) {
                commands.push(ToolCommand {
                    script,
                    if_exists: get_string_prop(child, "if-exists"),
                });
            }
        }
    }

    commands
}

fn parse_required_commands(node: &KdlNode, step: &str) -> ConfigResult<Vec<ToolCommand>> {
    let commands = parse_commands(node);
    if commands.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: step.to_string(),
            message: "at least one run command is required".to_string(),
        });
    }
    Ok(commands)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}
