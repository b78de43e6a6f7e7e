//! The job record and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::PushEvent;
use crate::{Error, JobId, Result};

/// Status of a job.
///
/// `Pending` is the only non-terminal state. A job moves from `Pending` to
/// exactly one of the terminal states and never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            JobStatus::Pending => false,
            JobStatus::Success | JobStatus::Failure | JobStatus::Error => true,
        }
    }

    /// Validate a transition to `next`, returning the new status.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus> {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Success | JobStatus::Failure | JobStatus::Error) => {
                Ok(next)
            }
            (
                JobStatus::Pending | JobStatus::Success | JobStatus::Failure | JobStatus::Error,
                _,
            ) => Err(Error::InvalidTransition {
                from: self,
                to: next,
            }),
        }
    }

    /// Lowercase wire name, as used by the git provider's status API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "success" => Ok(JobStatus::Success),
            "failure" => Ok(JobStatus::Failure),
            "error" => Ok(JobStatus::Error),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// One pipeline run for one push event.
///
/// Created in memory when a qualifying event arrives, mutated only by the
/// orchestrator while the pipeline runs, and persisted once it is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub repo_url: String,
    #[serde(rename = "ref")]
    pub r#ref: String,
    /// The SHA of the most recent commit on `ref` after the push.
    pub head_commit: String,
    pub author: String,
    pub time_started: DateTime<Utc>,
    pub time_ended: Option<DateTime<Utc>>,
    /// One segment per pipeline step that actually ran, in execution order.
    pub logs: Vec<String>,
}

impl Job {
    /// Start a pending job for a push event.
    pub fn start(event: &PushEvent) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            repo_url: event.repository.clone_url.clone(),
            r#ref: event.r#ref.clone(),
            head_commit: event.after.clone(),
            author: event.pusher.clone(),
            time_started: Utc::now(),
            time_ended: None,
            logs: Vec::new(),
        }
    }

    pub fn append_log(&mut self, segment: impl Into<String>) {
        self.logs.push(segment.into());
    }

    /// Move the job to a terminal status and stamp `time_ended`.
    pub fn finish(&mut self, status: JobStatus) -> Result<()> {
        self.status = self.status.transition(status)?;
        self.time_ended = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RepositoryInfo;

    fn make_event() -> PushEvent {
        PushEvent {
            r#ref: "refs/heads/main".to_string(),
            before: "0000000".to_string(),
            after: "abc1234".to_string(),
            created: false,
            commits: vec![],
            repository: RepositoryInfo {
                owner: "octo".to_string(),
                name: "widgets".to_string(),
                full_name: "octo/widgets".to_string(),
                clone_url: "https://github.com/octo/widgets.git".to_string(),
            },
            pusher: "octocat".to_string(),
        }
    }

    #[test]
    fn test_start_captures_provenance() {
        let job = Job::start(&make_event());

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.repo_url, "https://github.com/octo/widgets.git");
        assert_eq!(job.r#ref, "refs/heads/main");
        assert_eq!(job.head_commit, "abc1234");
        assert_eq!(job.author, "octocat");
        assert!(job.time_ended.is_none());
        assert!(job.logs.is_empty());
    }

    #[test]
    fn test_finish_sets_time_ended_once() {
        let mut job = Job::start(&make_event());
        job.finish(JobStatus::Success).unwrap();
        let ended = job.time_ended;

        assert!(ended.is_some());
        assert!(job.is_terminal());

        let err = job.finish(JobStatus::Failure).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: JobStatus::Success,
                to: JobStatus::Failure
            }
        ));
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.time_ended, ended);
    }

    #[test]
    fn test_pending_to_pending_is_rejected() {
        assert!(JobStatus::Pending.transition(JobStatus::Pending).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_serialized_shape() {
        let mut job = Job::start(&make_event());
        job.append_log("cloned");
        job.finish(JobStatus::Error).unwrap();

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["ref"], "refs/heads/main");
        assert_eq!(value["logs"][0], "cloned");
        assert_eq!(value["id"], job.id.to_string());

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }
}
