//! Job execution for pushci.
//!
//! Provides:
//! - A process runner that executes commands on the local host
//! - Ephemeral, job-scoped workspaces
//! - The pipeline steps (fetch, checkout, setup, lint, test)

pub mod error;
pub mod process;
pub mod steps;
pub mod workspace;

pub use error::{StepError, StepErrorKind, WorkspaceError};
pub use process::ProcessRunner;
pub use pushci_core::executor::{CommandOutput, CommandRunner, CommandSpec, RunError};
pub use steps::{CheckResult, PipelineSteps, StepKind};
pub use workspace::{WorkspaceGuard, WorkspaceManager};
