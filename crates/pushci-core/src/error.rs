//! Error types for pushci.

use thiserror::Error;

use crate::JobStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("external process error: {0}")]
    ExternalProcess(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

pub type Result<T> = std::result::Result<T, Error>;
