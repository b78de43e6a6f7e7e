//! Ephemeral job workspaces.
//!
//! Every job gets its own directory under the workspace root, named after the
//! job id, so concurrent jobs never share a working tree.

use pushci_core::JobId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::WorkspaceError;

/// Allocates and destroys job workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory a job's workspace lives in.
    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// Create a fresh, empty workspace for a job.
    ///
    /// Fails if the directory cannot be created or already exists.
    pub async fn allocate(&self, job_id: JobId) -> Result<WorkspaceGuard, WorkspaceError> {
        let path = self.path_for(job_id);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;

        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: path.clone(),
                source,
            })?;

        debug!(job_id = %job_id, path = %path.display(), "Allocated workspace");

        Ok(WorkspaceGuard {
            path,
            released: false,
        })
    }

    /// Delete a workspace tree. Already-absent directories are not an error.
    pub async fn destroy(&self, path: &Path) -> Result<(), WorkspaceError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Destroyed workspace");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Destroy {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Scoped handle to an allocated workspace.
///
/// Call [`WorkspaceGuard::release`] to remove the directory. A guard dropped
/// without being released (e.g. while unwinding) removes it synchronously.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    released: bool,
}

impl WorkspaceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destroy the workspace.
    pub async fn release(mut self, manager: &WorkspaceManager) -> Result<(), WorkspaceError> {
        self.released = true;
        manager.destroy(&self.path).await
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed unreleased workspace"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove unreleased workspace"
            ),
        }
    }
}
