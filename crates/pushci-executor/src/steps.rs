//! Pipeline steps: fetch, checkout, setup, lint and test.
//!
//! Fetch, checkout and setup are hard steps: any problem aborts the job.
//! Lint and test are soft steps: a failing tool only clears
//! [`CheckResult::passed`], while a tool that cannot run to completion is
//! still a hard error.

use pushci_core::executor::{CommandOutput, CommandRunner, CommandSpec};
use pushci_core::toolchain::{ToolCommand, Toolchain};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{StepError, StepErrorKind};

/// `sh` exit status for a command that was found but could not be executed.
const SHELL_NOT_EXECUTABLE: i32 = 126;
/// `sh` exit status for a command that was not found.
const SHELL_NOT_FOUND: i32 = 127;

/// The steps of a pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Fetch,
    Checkout,
    Setup,
    Lint,
    Test,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Fetch => "fetch",
            StepKind::Checkout => "checkout",
            StepKind::Setup => "setup",
            StepKind::Lint => "lint",
            StepKind::Test => "test",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a soft step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub passed: bool,
    pub log: String,
}

/// Runs pipeline steps through a [`CommandRunner`] using a [`Toolchain`].
#[derive(Clone)]
pub struct PipelineSteps {
    runner: Arc<dyn CommandRunner>,
    toolchain: Toolchain,
    timeout: Option<Duration>,
}

impl PipelineSteps {
    pub fn new(runner: Arc<dyn CommandRunner>, toolchain: Toolchain) -> Self {
        let timeout = toolchain.timeout;
        Self {
            runner,
            toolchain,
            timeout,
        }
    }

    /// Override the toolchain's per-command deadline. `None` keeps it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if timeout.is_some() {
            self.timeout = timeout;
        }
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Clone `source_url` into `dest`. The parent of `dest` must exist.
    pub async fn fetch(&self, source_url: &str, dest: &Path) -> Result<String, StepError> {
        let step = StepKind::Fetch;
        let parent = dest.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
            StepError::new(
                step,
                StepErrorKind::InvalidArgument(format!(
                    "destination {} has no parent directory",
                    dest.display()
                )),
                String::new(),
            )
        })?;
        require_dir(step, parent).await?;

        let spec = self
            .git_command()
            .args(["clone", "--", source_url])
            .arg(dest.to_string_lossy());

        let mut log = String::new();
        self.run_hard(step, &spec, parent, &mut log).await?;
        info!(url = %source_url, dest = %dest.display(), "Fetched repository");
        Ok(log)
    }

    /// Check out `reference` (a commit sha, tag or branch) in `repo_dir`.
    pub async fn checkout(&self, repo_dir: &Path, reference: &str) -> Result<String, StepError> {
        let step = StepKind::Checkout;
        if reference.is_empty() || reference.starts_with('-') {
            return Err(StepError::new(
                step,
                StepErrorKind::InvalidArgument(format!("invalid ref {:?}", reference)),
                String::new(),
            ));
        }
        require_dir(step, repo_dir).await?;

        let spec = self
            .git_command()
            .args(["checkout", "--detach", reference]);

        let mut log = String::new();
        self.run_hard(step, &spec, repo_dir, &mut log).await?;
        info!(reference = %reference, "Checked out");
        Ok(log)
    }

    /// Install dependencies with the toolchain's setup commands.
    ///
    /// Stops at the first command that exits non-zero.
    pub async fn setup_dependencies(&self, repo_dir: &Path) -> Result<String, StepError> {
        let step = StepKind::Setup;
        require_dir(step, repo_dir).await?;

        let mut log = String::new();
        for command in &self.toolchain.setup {
            if skip_missing(command, repo_dir, &mut log).await {
                continue;
            }
            let spec = self.tool_command(command, repo_dir);
            self.run_hard(step, &spec, repo_dir, &mut log).await?;
        }
        Ok(log)
    }

    /// Run the lint commands. All of them run; `passed` only if all exit zero.
    pub async fn run_lint(&self, repo_dir: &Path) -> Result<CheckResult, StepError> {
        self.run_checks(StepKind::Lint, &self.toolchain.lint, repo_dir)
            .await
    }

    /// Run the test commands. All of them run; `passed` only if all exit zero.
    pub async fn run_tests(&self, repo_dir: &Path) -> Result<CheckResult, StepError> {
        self.run_checks(StepKind::Test, &self.toolchain.test, repo_dir)
            .await
    }

    async fn run_checks(
        &self,
        step: StepKind,
        commands: &[ToolCommand],
        repo_dir: &Path,
    ) -> Result<CheckResult, StepError> {
        require_dir(step, repo_dir).await?;

        let mut log = String::new();
        let mut passed = true;
        for command in commands {
            if skip_missing(command, repo_dir, &mut log).await {
                continue;
            }
            let spec = self.tool_command(command, repo_dir);
            let output = self.run_logged(step, &spec, repo_dir, &mut log).await?;
            match output.exit_code {
                Some(0) => {}
                Some(code @ (SHELL_NOT_EXECUTABLE | SHELL_NOT_FOUND)) => {
                    return Err(StepError::new(
                        step,
                        StepErrorKind::ToolUnavailable {
                            command: spec.display_line(),
                            code,
                        },
                        log,
                    ));
                }
                Some(code) => {
                    debug!(step = %step, command = %spec.display_line(), code, "Check failed");
                    passed = false;
                }
                None => {
                    return Err(StepError::new(
                        step,
                        StepErrorKind::Terminated {
                            command: spec.display_line(),
                        },
                        log,
                    ));
                }
            }
        }

        info!(step = %step, passed, "Check finished");
        Ok(CheckResult { passed, log })
    }

    /// Run a command and fail the step unless it exits zero.
    async fn run_hard(
        &self,
        step: StepKind,
        spec: &CommandSpec,
        dir: &Path,
        log: &mut String,
    ) -> Result<(), StepError> {
        let output = self.run_logged(step, spec, dir, log).await?;
        match output.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(StepError::new(
                step,
                StepErrorKind::NonZeroExit {
                    command: spec.display_line(),
                    code,
                },
                std::mem::take(log),
            )),
            None => Err(StepError::new(
                step,
                StepErrorKind::Terminated {
                    command: spec.display_line(),
                },
                std::mem::take(log),
            )),
        }
    }

    /// Run a command and append it to the step log. Only failing to run is an error;
    /// the reason is left to the caller to report.
    async fn run_logged(
        &self,
        step: StepKind,
        spec: &CommandSpec,
        dir: &Path,
        log: &mut String,
    ) -> Result<CommandOutput, StepError> {
        let _ = writeln!(log, "$ {}", spec.display_line());

        match self.runner.run(spec, dir).await {
            Ok(output) => {
                append_output(log, &output);
                Ok(output)
            }
            Err(e) => {
                warn!(step = %step, command = %spec.display_line(), error = %e, "Command did not complete");
                Err(StepError::new(step, e, std::mem::take(log)))
            }
        }
    }

    fn git_command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("git").timeout(self.timeout);
        spec.env
            .insert("GIT_TERMINAL_PROMPT".to_string(), "0".to_string());
        spec
    }

    fn tool_command(&self, command: &ToolCommand, repo_dir: &Path) -> CommandSpec {
        CommandSpec::shell(command.script.clone())
            .envs(&self.tool_env(repo_dir))
            .timeout(self.timeout)
    }

    /// Environment for toolchain commands: the toolchain's own variables plus
    /// the job-local virtualenv, when one is configured.
    fn tool_env(&self, repo_dir: &Path) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.extend(
            self.toolchain
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        if let Some(venv) = &self.toolchain.venv {
            let venv_dir = repo_dir.join(venv);
            env.insert(
                "VIRTUAL_ENV".to_string(),
                venv_dir.to_string_lossy().into_owned(),
            );
            match prepend_path(venv_dir.join("bin")) {
                Some(path) => {
                    env.insert("PATH".to_string(), path);
                }
                None => warn!(venv = %venv_dir.display(), "Cannot add virtualenv to PATH"),
            }
        }

        env
    }
}

impl fmt::Debug for PipelineSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSteps")
            .field("toolchain", &self.toolchain.name)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn require_dir(step: StepKind, dir: &Path) -> Result<(), StepError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(StepError::new(
            step,
            StepErrorKind::MissingDirectory(dir.to_path_buf()),
            String::new(),
        )),
    }
}

/// Record and report a command whose `if-exists` path is absent.
async fn skip_missing(command: &ToolCommand, repo_dir: &Path, log: &mut String) -> bool {
    let Some(required) = &command.if_exists else {
        return false;
    };
    if tokio::fs::try_exists(repo_dir.join(required))
        .await
        .unwrap_or(false)
    {
        return false;
    }
    debug!(command = %command.script, required = %required, "Skipping command");
    let _ = writeln!(log, "# skipped `{}`: {} not found", command.script, required);
    true
}

fn append_output(log: &mut String, output: &CommandOutput) {
    for stream in [&output.stdout, &output.stderr] {
        if stream.is_empty() {
            continue;
        }
        log.push_str(stream);
        if !stream.ends_with('\n') {
            log.push('\n');
        }
    }
    match output.exit_code {
        Some(code) => {
            let _ = writeln!(log, "exit status: {}", code);
        }
        None => log.push_str("exit status: terminated by signal\n"),
    }
}

fn prepend_path(dir: PathBuf) -> Option<String> {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(dir).chain(std::env::split_paths(&current));
    std::env::join_paths(paths)
        .ok()
        .map(|joined| joined.to_string_lossy().into_owned())
}
