//! Configuration for pushci.
//!
//! This crate handles:
//! - System configuration from environment variables
//! - Toolchain definitions (pushci.kdl)

pub mod error;
pub mod system;
pub mod toolchain;

pub use error::{ConfigError, ConfigResult};
pub use system::{SystemConfig, job_log_url};
pub use toolchain::{load_toolchain, parse_toolchain};
