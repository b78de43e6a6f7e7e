//! Local pipeline execution command.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pushci_config::{SystemConfig, load_toolchain};
use pushci_core::event::{PushEvent, RepositoryInfo};
use pushci_core::notifier::{CommitTarget, NotifyError, StatusNotifier};
use pushci_core::toolchain::Toolchain;
use pushci_core::{JobId, JobStatus};
use pushci_executor::{PipelineSteps, ProcessRunner, WorkspaceManager};
use pushci_scheduler::JobOrchestrator;
use pushci_store::LogStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::logs::render_job;

pub struct RunOptions {
    pub clone_url: String,
    pub sha: String,
    pub r#ref: String,
    pub author: String,
    pub toolchain: Option<PathBuf>,
    pub log_dir: PathBuf,
}

/// Reports statuses to the local log instead of a git provider.
struct LogOnlyNotifier;

#[async_trait]
impl StatusNotifier for LogOnlyNotifier {
    async fn set_status(
        &self,
        target: &CommitTarget,
        status: JobStatus,
        job_id: JobId,
    ) -> Result<(), NotifyError> {
        info!(job_id = %job_id, sha = %target.sha, status = %status, "Status");
        Ok(())
    }

    async fn get_status(
        &self,
        _owner: &str,
        _repo: &str,
        _reference: &str,
    ) -> Result<JobStatus, NotifyError> {
        Ok(JobStatus::Pending)
    }
}

/// Run the pipeline on this machine and store the job like the server would.
pub async fn run_local(options: RunOptions) -> Result<()> {
    let config = SystemConfig::from_env().context("Invalid environment")?;

    let toolchain = match &options.toolchain {
        Some(path) => load_toolchain(path)
            .with_context(|| format!("Failed to load toolchain: {}", path.display()))?,
        None => Toolchain::default(),
    };
    println!("Toolchain: {}", toolchain.name);

    let store = Arc::new(
        LogStore::open(&options.log_dir)
            .await
            .with_context(|| format!("Failed to open log store: {}", options.log_dir.display()))?,
    );
    let steps = PipelineSteps::new(Arc::new(ProcessRunner::new()), toolchain)
        .with_timeout(config.step_timeout);
    let orchestrator = JobOrchestrator::new(
        Arc::new(steps),
        WorkspaceManager::new(&config.work_dir),
        store,
        Arc::new(LogOnlyNotifier),
    );

    let event = local_push_event(&options);
    println!(
        "Checking {} at {}\n",
        event.repository.clone_url, event.after
    );

    let Some(job) = orchestrator.run(event).await else {
        return Ok(());
    };

    print!("{}", render_job(&job));
    println!("\nStored in {}", options.log_dir.display());

    if job.status != JobStatus::Success {
        std::process::exit(1);
    }
    Ok(())
}

fn local_push_event(options: &RunOptions) -> PushEvent {
    let repository = repository_from_clone_url(&options.clone_url);
    PushEvent {
        r#ref: options.r#ref.clone(),
        before: String::new(),
        after: options.sha.clone(),
        created: false,
        commits: Vec::new(),
        repository,
        pusher: options.author.clone(),
    }
}

/// Derive owner and name from an https, ssh or local clone URL.
fn repository_from_clone_url(clone_url: &str) -> RepositoryInfo {
    let trimmed = clone_url.trim_end_matches('/');
    let path = Url::parse(trimmed)
        .ok()
        .filter(|u| u.has_host() || u.scheme() == "file")
        .map(|u| u.path().to_string())
        .unwrap_or_else(|| trimmed.to_string());

    let mut parts = path.rsplit(['/', ':']).filter(|s| !s.is_empty());
    let name = parts
        .next()
        .map(|n| n.trim_end_matches(".git"))
        .filter(|n| !n.is_empty())
        .unwrap_or("repo")
        .to_string();
    let owner = parts.next().unwrap_or("local").to_string();

    RepositoryInfo {
        full_name: format!("{}/{}", owner, name),
        owner,
        name,
        clone_url: clone_url.to_string(),
    }
}
