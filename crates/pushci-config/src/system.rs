//! System configuration from environment variables.

use crate::{ConfigError, ConfigResult};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_BIND: &str = "0.0.0.0:8001";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8001";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Address the HTTP server listens on.
    pub bind: SocketAddr,
    /// Root directory for job workspaces.
    pub work_dir: PathBuf,
    /// Directory holding persisted job records.
    pub log_dir: PathBuf,
    /// Base URL used to link commit statuses to job logs.
    pub public_url: Url,
    /// Optional toolchain file.
    pub toolchain_path: Option<PathBuf>,
    /// Per-command deadline; overrides the toolchain file.
    pub step_timeout: Option<Duration>,
    /// Token for the commit status API.
    pub github_token: Option<String>,
    pub github_api_url: Url,
}

impl SystemConfig {
    /// Read configuration from the process environment.
    ///
    /// Variables:
    /// - PUSHCI_BIND (default: 0.0.0.0:8001)
    /// - PUSHCI_WORK_DIR (default: <tmp>/pushci-work)
    /// - PUSHCI_LOG_DIR (default: ./logs)
    /// - PUSHCI_PUBLIC_URL (default: http://localhost:8001)
    /// - PUSHCI_TOOLCHAIN (optional, path to pushci.kdl)
    /// - PUSHCI_STEP_TIMEOUT (optional, seconds)
    /// - GITHUB_TOKEN (optional)
    /// - GITHUB_API_URL (default: https://api.github.com)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = var("PUSHCI_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("PUSHCI_BIND", e))?;

        let work_dir = var("PUSHCI_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("pushci-work"));

        let log_dir = var("PUSHCI_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"));

        let public_url = parse_url(
            "PUSHCI_PUBLIC_URL",
            var("PUSHCI_PUBLIC_URL").as_deref().unwrap_or(DEFAULT_PUBLIC_URL),
        )?;

        let step_timeout = var("PUSHCI_STEP_TIMEOUT")
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid("PUSHCI_STEP_TIMEOUT", "expected positive seconds"))
            })
            .transpose()?;

        let github_api_url = parse_url(
            "GITHUB_API_URL",
            var("GITHUB_API_URL")
                .as_deref()
                .unwrap_or(DEFAULT_GITHUB_API_URL),
        )?;

        Ok(Self {
            bind,
            work_dir,
            log_dir,
            public_url,
            toolchain_path: var("PUSHCI_TOOLCHAIN").map(PathBuf::from),
            step_timeout,
            github_token: var("GITHUB_TOKEN"),
            github_api_url,
        })
    }

    /// Link to a job's log on this server.
    pub fn log_url(&self, job_id: &str) -> String {
        job_log_url(&self.public_url, job_id)
    }
}

/// `<base>/logs/<id>`, tolerant of a trailing slash on the base.
pub fn job_log_url(base: &Url, job_id: &str) -> String {
    format!("{}/logs/{}", base.as_str().trim_end_matches('/'), job_id)
}

fn parse_url(field: &str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|e| invalid(field, e))
}

fn invalid(field: &str, message: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ConfigResult<SystemConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SystemConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind, "0.0.0.0:8001".parse().unwrap());
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert!(config.work_dir.ends_with("pushci-work"));
        assert_eq!(config.public_url.as_str(), "http://localhost:8001/");
        assert_eq!(config.github_api_url.as_str(), "https://api.github.com/");
        assert!(config.github_token.is_none());
        assert!(config.step_timeout.is_none());
        assert!(config.toolchain_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PUSHCI_BIND", "127.0.0.1:9000"),
            ("PUSHCI_WORK_DIR", "/srv/pushci/work"),
            ("PUSHCI_LOG_DIR", "/srv/pushci/logs"),
            ("PUSHCI_PUBLIC_URL", "https://ci.example.com/"),
            ("PUSHCI_TOOLCHAIN", "/etc/pushci.kdl"),
            ("PUSHCI_STEP_TIMEOUT", "600"),
            ("GITHUB_TOKEN", "ghp_secret"),
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.work_dir, PathBuf::from("/srv/pushci/work"));
        assert_eq!(config.log_dir, PathBuf::from("/srv/pushci/logs"));
        assert_eq!(config.toolchain_path, Some(PathBuf::from("/etc/pushci.kdl")));
        assert_eq!(config.step_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.github_token.as_deref(), Some("ghp_secret"));
        assert_eq!(
            config.log_url("abc"),
            "https://ci.example.com/logs/abc".to_string()
        );
    }

    #[test]
    fn test_blank_token_is_absent() {
        let config = config_from(&[("GITHUB_TOKEN", "  ")]).unwrap();
        assert!(config.github_token.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("PUSHCI_BIND", "not an address")]).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "PUSHCI_BIND"
        ));
        assert!(matches!(
            config_from(&[("PUSHCI_STEP_TIMEOUT", "soon")]).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "PUSHCI_STEP_TIMEOUT"
        ));
        assert!(matches!(
            config_from(&[("PUSHCI_STEP_TIMEOUT", "0")]).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
        assert!(matches!(
            config_from(&[("PUSHCI_PUBLIC_URL", "::nope")]).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "PUSHCI_PUBLIC_URL"
        ));
    }

    #[test]
    fn test_job_log_url_without_trailing_slash() {
        let base = Url::parse("http://localhost:8001").unwrap();
        assert_eq!(job_log_url(&base, "42"), "http://localhost:8001/logs/42");
    }
}
