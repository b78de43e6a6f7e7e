//! Application state.

use pushci_config::SystemConfig;
use pushci_core::notifier::StatusNotifier;
use pushci_core::toolchain::Toolchain;
use pushci_executor::{PipelineSteps, ProcessRunner, WorkspaceManager};
use pushci_scheduler::JobOrchestrator;
use pushci_store::LogStore;
use std::sync::Arc;

use crate::services::GitHubStatusNotifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LogStore>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    pub fn new(store: Arc<LogStore>, orchestrator: JobOrchestrator) -> Self {
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wire the server: local process runner, workspaces under the work dir,
    /// the log store and the GitHub notifier.
    pub async fn from_config(
        config: &SystemConfig,
        toolchain: Toolchain,
    ) -> Result<Self, pushci_core::Error> {
        let store = Arc::new(LogStore::open(&config.log_dir).await?);
        let notifier: Arc<dyn StatusNotifier> = Arc::new(GitHubStatusNotifier::from_config(config));

        let steps = PipelineSteps::new(Arc::new(ProcessRunner::new()), toolchain)
            .with_timeout(config.step_timeout);
        let orchestrator = JobOrchestrator::new(
            Arc::new(steps),
            WorkspaceManager::new(&config.work_dir),
            store.clone(),
            notifier,
        );

        Ok(Self::new(store, orchestrator))
    }
}
