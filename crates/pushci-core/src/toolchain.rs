//! Toolchain definitions: the commands behind the setup, lint and test steps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Commands and environment used to verify a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Toolchain name (e.g., "python").
    pub name: String,
    /// Repository-relative virtual environment directory, if any.
    pub venv: Option<String>,
    /// Deadline applied to every command.
    pub timeout: Option<Duration>,
    /// Extra environment variables for every command.
    pub env: HashMap<String, String>,
    /// Dependency setup commands.
    pub setup: Vec<ToolCommand>,
    /// Lint commands. Only fatal error classes should be selected.
    pub lint: Vec<ToolCommand>,
    /// Test commands.
    pub test: Vec<ToolCommand>,
}

/// A shell script run as part of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Script executed with `/bin/sh -c`.
    pub script: String,
    /// Only run when this repository-relative path exists.
    pub if_exists: Option<String>,
}

impl ToolCommand {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            if_exists: None,
        }
    }

    pub fn if_exists(mut self, path: impl Into<String>) -> Self {
        self.if_exists = Some(path.into());
        self
    }
}

impl Default for Toolchain {
    /// Python projects: a job-local virtualenv, `requirements.txt` and flake8
    /// installed into it, flake8 restricted to syntax errors and undefined
    /// names, then unittest.
    fn default() -> Self {
        Self {
            name: "python".to_string(),
            venv: Some(".venv".to_string()),
            timeout: None,
            env: HashMap::new(),
            setup: vec![
                ToolCommand::new("python3 -m venv .venv"),
                ToolCommand::new("python3 -m pip install -r requirements.txt")
                    .if_exists("requirements.txt"),
                ToolCommand::new("python3 -m pip install flake8"),
            ],
            lint: vec![ToolCommand::new(
                "python3 -m flake8 --select=E9,F63,F7,F82 --show-source --statistics .",
            )],
            test: vec![ToolCommand::new("python3 -m unittest discover -v")],
        }
    }
}
