//! Job log retrieval.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use pushci_core::{Job, JobId};
use pushci_store::JobStore;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/{job_id}", get(get_log))
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<JobId>,
}

async fn list_logs(State(state): State<AppState>) -> Result<Json<LogsResponse>, ApiError> {
    let logs = state.store.list_ids().await?;
    Ok(Json(LogsResponse { logs }))
}

async fn get_log(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    // Anything that is not a job id cannot have a log.
    let id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Log for job {} not found", job_id)))?;
    let job = state.store.get(id).await?;
    Ok(Json(job))
}
