//! GitHub commit status client.

use async_trait::async_trait;
use pushci_config::{SystemConfig, job_log_url};
use pushci_core::notifier::{CommitTarget, NotifyError, StatusNotifier, describe};
use pushci_core::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Context shown next to the status on GitHub.
pub const STATUS_CONTEXT: &str = "pushci/lint-and-test";

const USER_AGENT: &str = "pushci";
const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Body of a commit status update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub state: JobStatus,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

#[derive(Debug, Deserialize)]
struct CombinedStatus {
    state: String,
}

/// Reports job statuses through the GitHub commit status API.
#[derive(Debug, Clone)]
pub struct GitHubStatusNotifier {
    client: reqwest::Client,
    api_url: Url,
    public_url: Url,
    token: Option<String>,
}

impl GitHubStatusNotifier {
    pub fn new(api_url: Url, public_url: Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            public_url,
            token,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.github_api_url.clone(),
            config.public_url.clone(),
            config.github_token.clone(),
        )
    }

    /// The payload sent for `status` of `job_id`.
    pub fn status_update(&self, status: JobStatus, job_id: JobId) -> StatusUpdate {
        StatusUpdate {
            state: status,
            target_url: job_log_url(&self.public_url, &job_id.to_string()),
            description: describe(status).to_string(),
            context: STATUS_CONTEXT.to_string(),
        }
    }

    fn token(&self) -> Result<&str, NotifyError> {
        self.token
            .as_deref()
            .ok_or(NotifyError::MissingToken(TOKEN_VAR))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, url: String, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
    }
}

#[async_trait]
impl StatusNotifier for GitHubStatusNotifier {
    async fn set_status(
        &self,
        target: &CommitTarget,
        status: JobStatus,
        job_id: JobId,
    ) -> Result<(), NotifyError> {
        let token = self.token()?;
        let url = self.endpoint(&format!(
            "/repos/{}/{}/statuses/{}",
            target.owner, target.repo, target.sha
        ));

        let response = self
            .request(reqwest::Method::POST, url, token)
            .json(&self.status_update(status, job_id))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: code,
                message: text,
            });
        }

        debug!(
            job_id = %job_id,
            status = %status,
            repo = %format!("{}/{}", target.owner, target.repo),
            sha = %target.sha,
            "Reported commit status"
        );
        Ok(())
    }

    async fn get_status(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<JobStatus, NotifyError> {
        let token = self.token()?;
        let url = self.endpoint(&format!(
            "/repos/{}/{}/commits/{}/status",
            owner, repo, reference
        ));

        let response = self
            .request(reqwest::Method::GET, url, token)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: code,
                message: text,
            });
        }

        let combined: CombinedStatus = response
            .json()
            .await
            .map_err(|e| NotifyError::Parse(e.to_string()))?;

        combined.state.parse().map_err(NotifyError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, HeaderMap, Value)>>>;

    /// Serve a stand-in for the GitHub API on a random local port.
    async fn fake_github(reject: bool) -> (Url, Captured) {
        let captured: Captured = Arc::default();

        async fn create_status(
            State((captured, reject)): State<(Captured, bool)>,
            Path((owner, repo, sha)): Path<(String, String, String)>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            captured
                .lock()
                .unwrap()
                .push((format!("{}/{}@{}", owner, repo, sha), headers, body));
            if reject {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "message": "No commit found for SHA" })),
                )
            } else {
                (StatusCode::CREATED, Json(json!({ "id": 1 })))
            }
        }

        async fn combined_status(Path((_o, _r, reference)): Path<(String, String, String)>) -> Json<Value> {
            let state = if reference == "main" { "failure" } else { "bogus" };
            Json(json!({ "state": state, "statuses": [] }))
        }

        let app = Router::new()
            .route("/repos/{owner}/{repo}/statuses/{sha}", post(create_status))
            .route(
                "/repos/{owner}/{repo}/commits/{reference}/status",
                get(combined_status),
            )
            .with_state((captured.clone(), reject));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (Url::parse(&format!("http://{}", addr)).unwrap(), captured)
    }

    fn target() -> CommitTarget {
        CommitTarget {
            owner: "octo".to_string(),
            repo: "widgets".to_string(),
            sha: "abc1234".to_string(),
        }
    }

    fn public_url() -> Url {
        Url::parse("https://ci.example.com").unwrap()
    }

    #[test]
    fn test_status_update_payload() {
        let notifier = GitHubStatusNotifier::new(
            Url::parse("https://api.github.com").unwrap(),
            public_url(),
            Some("t".to_string()),
        );
        let job_id = JobId::new();

        let update = notifier.status_update(JobStatus::Failure, job_id);
        let body = serde_json::to_value(&update).unwrap();

        assert_eq!(body["state"], "failure");
        assert_eq!(
            body["target_url"],
            format!("https://ci.example.com/logs/{}", job_id)
        );
        assert_eq!(body["context"], STATUS_CONTEXT);
        assert_eq!(body["description"], describe(JobStatus::Failure));
    }

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let notifier = GitHubStatusNotifier::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            public_url(),
            None,
        );

        let err = notifier
            .set_status(&target(), JobStatus::Pending, JobId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NotifyError::MissingToken("GITHUB_TOKEN")));
        assert_eq!(err.to_string(), "GITHUB_TOKEN is not set");
        let core: pushci_core::Error = err.into();
        assert!(matches!(core, pushci_core::Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_set_status_posts_to_commit() {
        let (api_url, captured) = fake_github(false).await;
        let notifier = GitHubStatusNotifier::new(api_url, public_url(), Some("s3cret".to_string()));
        let job_id = JobId::new();

        notifier
            .set_status(&target(), JobStatus::Success, job_id)
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (commit, headers, body) = &captured[0];
        assert_eq!(commit, "octo/widgets@abc1234");
        assert_eq!(headers["authorization"], "Bearer s3cret");
        assert_eq!(headers["accept"], "application/vnd.github+json");
        assert_eq!(headers["user-agent"], USER_AGENT);
        assert_eq!(body["state"], "success");
        assert_eq!(body["context"], STATUS_CONTEXT);
        assert!(body["target_url"].as_str().unwrap().ends_with(&job_id.to_string()));
    }

    #[tokio::test]
    async fn test_rejected_status_update() {
        let (api_url, _) = fake_github(true).await;
        let notifier = GitHubStatusNotifier::new(api_url, public_url(), Some("t".to_string()));

        let err = notifier
            .set_status(&target(), JobStatus::Error, JobId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NotifyError::Rejected { status: 422, .. }));
        let core: pushci_core::Error = err.into();
        assert!(matches!(core, pushci_core::Error::Notification(_)));
    }

    #[tokio::test]
    async fn test_get_status_reads_combined_state() {
        let (api_url, _) = fake_github(false).await;
        let notifier = GitHubStatusNotifier::new(api_url, public_url(), Some("t".to_string()));

        let status = notifier.get_status("octo", "widgets", "main").await.unwrap();
        assert_eq!(status, JobStatus::Failure);

        let err = notifier
            .get_status("octo", "widgets", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Parse(_)));
    }
}
