//! Core domain types and traits for the pushci CI service.
//!
//! This crate contains:
//! - Job identifiers and the job record with its status state machine
//! - Push event parsing and the skip condition
//! - The command runner trait used by pipeline steps
//! - The status notifier trait used to report back to the git provider
//! - Toolchain definitions for the setup, lint and test steps

pub mod error;
pub mod event;
pub mod executor;
pub mod id;
pub mod job;
pub mod notifier;
pub mod toolchain;

pub use error::{Error, Result};
pub use id::JobId;
pub use job::{Job, JobStatus};
