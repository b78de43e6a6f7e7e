//! Step and workspace errors.

use pushci_core::executor::RunError;
use std::path::PathBuf;
use thiserror::Error;

use crate::StepKind;

/// A hard failure of a pipeline step.
///
/// Carries the log produced before the failure so the step's segment can still
/// be recorded.
#[derive(Debug, Error)]
#[error("{step} step failed: {kind}")]
pub struct StepError {
    pub step: StepKind,
    #[source]
    pub kind: StepErrorKind,
    pub log: String,
}

#[derive(Debug, Error)]
pub enum StepErrorKind {
    #[error("directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("`{command}` exited with status {code}")]
    NonZeroExit { command: String, code: i32 },

    #[error("`{command}` was terminated by a signal")]
    Terminated { command: String },

    /// The shell could not find or execute the tool (exit 127 or 126).
    #[error("`{command}` could not be run (exit status {code})")]
    ToolUnavailable { command: String, code: i32 },
}

impl StepError {
    pub fn new(step: StepKind, kind: impl Into<StepErrorKind>, log: impl Into<String>) -> Self {
        Self {
            step,
            kind: kind.into(),
            log: log.into(),
        }
    }
}

impl From<StepError> for pushci_core::Error {
    fn from(err: StepError) -> Self {
        pushci_core::Error::ExternalProcess(err.to_string())
    }
}

/// Workspace allocation and cleanup errors.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace {}: {source}", .path.display())]
    Destroy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<WorkspaceError> for pushci_core::Error {
    fn from(err: WorkspaceError) -> Self {
        pushci_core::Error::Resource(err.to_string())
    }
}
