//! Local process runner.

use async_trait::async_trait;
use pushci_core::executor::{CommandOutput, CommandRunner, CommandSpec, RunError};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands as child processes of the server.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec, working_dir: &Path) -> Result<CommandOutput, RunError> {
        debug!(
            command = %spec.display_line(),
            cwd = %working_dir.display(),
            "Running command"
        );

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out wait drops the child, which must take the process with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let result = match spec.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %spec.display_line(), ?timeout, "Command timed out");
                    return Err(RunError::Timeout {
                        program: spec.program.clone(),
                        timeout,
                    });
                }
            },
            None => wait.await,
        };

        let output = result.map_err(|source| RunError::Wait {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
