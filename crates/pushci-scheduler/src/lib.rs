//! Job orchestration for pushci.
//!
//! Turns push events into jobs, drives each job through the pipeline steps,
//! and always records and reports the outcome.

pub mod orchestrator;

pub use orchestrator::JobOrchestrator;
