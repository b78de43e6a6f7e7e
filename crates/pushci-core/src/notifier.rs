//! Status notifier trait.
//!
//! Notifiers report the status of a job against a specific commit on the git
//! provider, with a link back to the job's log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus};

/// The commit a status is reported against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTarget {
    /// The account owner of the repository.
    pub owner: String,
    /// Repository name without the `.git` extension.
    pub repo: String,
    pub sha: String,
}

/// Errors reported by a notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("{0} is not set")]
    MissingToken(&'static str),

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider rejected status update ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<NotifyError> for crate::Error {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::MissingToken(_) => crate::Error::Configuration(err.to_string()),
            _ => crate::Error::Notification(err.to_string()),
        }
    }
}

/// Trait for status notifiers.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Report `status` for `target`, linking to the log of `job_id`.
    async fn set_status(
        &self,
        target: &CommitTarget,
        status: JobStatus,
        job_id: JobId,
    ) -> Result<(), NotifyError>;

    /// Latest combined status for a commit SHA, branch or tag.
    async fn get_status(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<JobStatus, NotifyError>;
}

/// Human readable description for a status, shown next to the check.
pub fn describe(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Lint and tests are running",
        JobStatus::Success => "Lint and tests passed",
        JobStatus::Failure => "Lint or tests reported problems",
        JobStatus::Error => "The pipeline could not complete",
    }
}
