//! File-backed job log store.
//!
//! Layout under the store directory:
//! - `<id>.json`: one pretty-printed job record per id, written once
//! - `index.json`: `{"ids": [...]}` in insertion order
//!
//! Every file is replaced atomically (temp file, fsync, rename). Index
//! updates are serialized by a per-store lock; record reads take no lock.

use async_trait::async_trait;
use pushci_core::{Job, JobId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{StoreError, StoreResult};

const INDEX_FILE: &str = "index.json";
const RECORD_EXT: &str = "json";

/// Storage for finished jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a job record under `id`. A second put for a known id keeps the
    /// first record and succeeds without touching the index.
    async fn put(&self, id: JobId, job: &Job) -> StoreResult<()>;

    /// Load the record stored under `id`.
    async fn get(&self, id: JobId) -> StoreResult<Job>;

    /// All known job ids in insertion order.
    async fn list_ids(&self) -> StoreResult<Vec<JobId>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    ids: Vec<JobId>,
}

/// Job records as JSON files in one directory.
#[derive(Debug)]
pub struct LogStore {
    dir: PathBuf,
    index: Mutex<Vec<JobId>>,
}

impl LogStore {
    /// Open (or create) a store in `dir` and reconcile the index with the
    /// records on disk.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let records = scan_records(&dir).await?;
        let loaded = read_index(&dir).await;
        let index_missing = loaded.is_none();
        let (ids, changed) = reconcile(loaded.unwrap_or_default(), &records);

        if index_missing || changed {
            info!(
                dir = %dir.display(),
                records = ids.len(),
                "Rewriting job index"
            );
            write_index(&dir, &ids).await?;
        }

        debug!(dir = %dir.display(), jobs = ids.len(), "Opened log store");

        Ok(Self {
            dir,
            index: Mutex::new(ids),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Discard the index and regenerate it from the records on disk.
    pub async fn rebuild_index(&self) -> StoreResult<Vec<JobId>> {
        let mut index = self.index.lock().await;
        let ids = scan_records(&self.dir).await?;
        write_index(&self.dir, &ids).await?;
        *index = ids.clone();
        info!(dir = %self.dir.display(), jobs = ids.len(), "Rebuilt job index");
        Ok(ids)
    }

    fn record_path(&self, id: JobId) -> PathBuf {
        record_path(&self.dir, id)
    }
}

#[async_trait]
impl JobStore for LogStore {
    async fn put(&self, id: JobId, job: &Job) -> StoreResult<()> {
        let mut index = self.index.lock().await;
        if index.contains(&id) {
            debug!(job_id = %id, "Job already stored, keeping first record");
            return Ok(());
        }

        let path = self.record_path(id);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        if exists {
            warn!(job_id = %id, "Unindexed record found, keeping it");
        } else {
            let data =
                serde_json::to_vec_pretty(job).map_err(|e| StoreError::serialization(&path, e))?;
            write_atomic(path, data).await?;
        }

        let mut ids = index.clone();
        ids.push(id);
        write_index(&self.dir, &ids).await?;
        *index = ids;

        debug!(job_id = %id, status = %job.status, "Stored job");
        Ok(())
    }

    async fn get(&self, id: JobId) -> StoreResult<Job> {
        let path = self.record_path(id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&data).map_err(|e| StoreError::serialization(&path, e))
    }

    async fn list_ids(&self) -> StoreResult<Vec<JobId>> {
        Ok(self.index.lock().await.clone())
    }
}

fn record_path(dir: &Path, id: JobId) -> PathBuf {
    dir.join(format!("{}.{}", id, RECORD_EXT))
}

/// Ids of all record files in `dir`, sorted.
async fn scan_records(dir: &Path) -> StoreResult<Vec<JobId>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let mut ids = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<JobId>().ok())
        {
            ids.push(id);
        }
    }

    ids.sort();
    Ok(ids)
}

/// Load the index file. `None` when it is absent or unreadable.
async fn read_index(dir: &Path) -> Option<Vec<JobId>> {
    let path = dir.join(INDEX_FILE);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read job index");
            return None;
        }
    };

    match serde_json::from_slice::<IndexFile>(&data) {
        Ok(index) => Some(index.ids),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt job index");
            None
        }
    }
}

/// Drop indexed ids without a record (and duplicates), then append records
/// missing from the index. Returns the new index and whether it changed.
fn reconcile(indexed: Vec<JobId>, records: &[JobId]) -> (Vec<JobId>, bool) {
    let on_disk: HashSet<JobId> = records.iter().copied().collect();
    let mut seen = HashSet::new();

    let mut ids: Vec<JobId> = indexed
        .iter()
        .copied()
        .filter(|id| on_disk.contains(id) && seen.insert(*id))
        .collect();
    let mut changed = ids.len() != indexed.len();

    for id in records {
        if seen.insert(*id) {
            ids.push(*id);
            changed = true;
        }
    }

    (ids, changed)
}

async fn write_index(dir: &Path, ids: &[JobId]) -> StoreResult<()> {
    let path = dir.join(INDEX_FILE);
    let data = serde_json::to_vec_pretty(&IndexFile { ids: ids.to_vec() })
        .map_err(|e| StoreError::serialization(&path, e))?;
    write_atomic(path, data).await
}

async fn write_atomic(target: PathBuf, data: Vec<u8>) -> StoreResult<()> {
    let path = target.clone();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &data))
        .await
        .map_err(|e| StoreError::io(&path, std::io::Error::other(e)))?
        .map_err(|e| StoreError::io(&path, e))
}

/// Write to a temp file in the target's directory, fsync, rename over the
/// target, then fsync the directory so the rename survives a crash.
fn write_atomic_blocking(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "no parent directory"))?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;
    sync_dir(parent)
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}
