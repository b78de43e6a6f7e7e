//! Persistence layer for pushci.
//!
//! Finished jobs are stored as one JSON document per job next to an index of
//! known job ids. The index can always be rebuilt from the records.

pub mod error;
pub mod log_store;

pub use error::{StoreError, StoreResult};
pub use log_store::{JobStore, LogStore};
