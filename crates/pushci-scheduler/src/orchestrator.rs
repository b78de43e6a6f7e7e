//! Job orchestrator - runs one pipeline per push event.
//!
//! Every job that is started ends with the same final phase, whatever happened
//! before it: the workspace is removed, the job is stamped and stored, and the
//! final status is reported.

use futures::FutureExt;
use pushci_core::event::PushEvent;
use pushci_core::notifier::{CommitTarget, StatusNotifier};
use pushci_core::{Job, JobId, JobStatus};
use pushci_executor::{PipelineSteps, StepError, WorkspaceManager};
use pushci_store::JobStore;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Directory name used when the repository name cannot be used as one.
const FALLBACK_CHECKOUT_DIR: &str = "repo";

/// Drives jobs from push event to stored, reported result.
#[derive(Clone)]
pub struct JobOrchestrator {
    steps: Arc<PipelineSteps>,
    workspaces: WorkspaceManager,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn StatusNotifier>,
}

impl JobOrchestrator {
    pub fn new(
        steps: Arc<PipelineSteps>,
        workspaces: WorkspaceManager,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            steps,
            workspaces,
            store,
            notifier,
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run the pipeline for `event` to completion.
    ///
    /// Returns `None` without doing anything when the event is skipped,
    /// otherwise the finished job as it was stored.
    pub async fn run(&self, event: PushEvent) -> Option<Job> {
        if event.should_skip() {
            info!(git_ref = %event.r#ref, "Skipping ref creation without commits");
            return None;
        }
        Some(self.execute(Job::start(&event), &event).await)
    }

    /// Start the pipeline for `event` in the background and return its job id.
    pub fn submit(&self, event: PushEvent) -> Option<JobId> {
        if event.should_skip() {
            info!(git_ref = %event.r#ref, "Skipping ref creation without commits");
            return None;
        }

        let job = Job::start(&event);
        let job_id = job.id;
        let this = self.clone();
        tokio::spawn(async move {
            this.execute_detached(job, &event).await;
        });

        Some(job_id)
    }

    /// Run a background job. A panic after the pipeline, which would otherwise
    /// vanish with the task, is logged and the job is dropped.
    async fn execute_detached(&self, job: Job, event: &PushEvent) -> Option<Job> {
        let job_id = job.id;
        match AssertUnwindSafe(self.execute(job, event)).catch_unwind().await {
            Ok(job) => Some(job),
            Err(panic) => {
                error!(
                    job_id = %job_id,
                    panic = %panic_message(panic.as_ref()),
                    "Job panicked after the pipeline"
                );
                None
            }
        }
    }

    async fn execute(&self, mut job: Job, event: &PushEvent) -> Job {
        let target = CommitTarget {
            owner: event.repository.owner.clone(),
            repo: event.repository.name.clone(),
            sha: event.after.clone(),
        };

        info!(
            job_id = %job.id,
            repo = %event.repository.full_name,
            git_ref = %event.ref_name(),
            sha = %target.sha,
            "Starting job"
        );
        for commit in &event.commits {
            debug!(
                job_id = %job.id,
                sha = %commit.sha,
                author = %commit.author,
                message = %commit.message.lines().next().unwrap_or_default(),
                "Commit in push"
            );
        }

        if let Err(e) = self
            .notifier
            .set_status(&target, JobStatus::Pending, job.id)
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to report pending status");
        }

        let status = match self.workspaces.allocate(job.id).await {
            Ok(workspace) => {
                let outcome = AssertUnwindSafe(self.pipeline(&mut job, event, workspace.path()))
                    .catch_unwind()
                    .await;
                let status = outcome.unwrap_or_else(|panic| {
                    error!(
                        job_id = %job.id,
                        panic = %panic_message(panic.as_ref()),
                        "Pipeline panicked"
                    );
                    JobStatus::Error
                });

                if let Err(e) = workspace.release(&self.workspaces).await {
                    warn!(job_id = %job.id, error = %e, "Failed to remove workspace");
                }
                status
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to allocate workspace");
                if let Err(e) = self.workspaces.destroy(&self.workspaces.path_for(job.id)).await {
                    warn!(job_id = %job.id, error = %e, "Failed to remove workspace");
                }
                JobStatus::Error
            }
        };

        self.finish(job, status, &target).await
    }

    /// Fetch, checkout, setup, lint and test. Returns the job's final status.
    async fn pipeline(&self, job: &mut Job, event: &PushEvent, workspace: &Path) -> JobStatus {
        let repo_dir = checkout_dir(workspace, &event.repository.name);

        match self.steps.fetch(&event.repository.clone_url, &repo_dir).await {
            Ok(log) => job.append_log(log),
            Err(e) => return hard_failure(job, e),
        }

        match self.steps.checkout(&repo_dir, &event.after).await {
            Ok(log) => job.append_log(log),
            Err(e) => return hard_failure(job, e),
        }

        match self.steps.setup_dependencies(&repo_dir).await {
            Ok(log) => job.append_log(log),
            Err(e) => return hard_failure(job, e),
        }

        let lint = match self.steps.run_lint(&repo_dir).await {
            Ok(result) => result,
            Err(e) => return hard_failure(job, e),
        };
        job.append_log(lint.log);

        let tests = match self.steps.run_tests(&repo_dir).await {
            Ok(result) => result,
            Err(e) => return hard_failure(job, e),
        };
        job.append_log(tests.log);

        info!(
            job_id = %job.id,
            lint_passed = lint.passed,
            tests_passed = tests.passed,
            "Checks finished"
        );

        if lint.passed && tests.passed {
            JobStatus::Success
        } else {
            JobStatus::Failure
        }
    }

    async fn finish(&self, mut job: Job, status: JobStatus, target: &CommitTarget) -> Job {
        if let Err(e) = job.finish(status) {
            error!(job_id = %job.id, error = %e, "Cannot finish job");
        }

        if let Err(e) = self.store.put(job.id, &job).await {
            error!(job_id = %job.id, error = %e, "Failed to store job");
        }

        if let Err(e) = self.notifier.set_status(target, job.status, job.id).await {
            error!(job_id = %job.id, status = %job.status, error = %e, "Failed to report final status");
        }

        info!(job_id = %job.id, status = %job.status, "Job finished");
        job
    }
}

/// Record the failed step's output and end the pipeline.
fn hard_failure(job: &mut Job, err: StepError) -> JobStatus {
    error!(job_id = %job.id, step = %err.step, error = %err.kind, "Step failed");
    let segment = format!("{}{}\n", err.log, err);
    job.append_log(segment);
    JobStatus::Error
}

fn checkout_dir(workspace: &Path, repo_name: &str) -> PathBuf {
    let usable = !repo_name.is_empty()
        && repo_name != "."
        && repo_name != ".."
        && !repo_name.contains(['/', '\\']);
    workspace.join(if usable {
        repo_name
    } else {
        FALLBACK_CHECKOUT_DIR
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
