//! HTTP server for pushci.
//!
//! Accepts push webhooks, serves stored job logs and reports commit statuses
//! back to GitHub.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;
