//! Push events from the git provider.

use serde::{Deserialize, Serialize};

/// Parsed push event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    /// The full git ref that was pushed, e.g. `refs/heads/main`.
    pub r#ref: String,
    pub before: String,
    pub after: String,
    /// Whether this push created the ref.
    pub created: bool,
    pub commits: Vec<CommitInfo>,
    pub repository: RepositoryInfo,
    pub pusher: String,
}

/// Identity of the repository a push belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
}

/// Commit information from a push event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Empty when the payload omits the commit id.
    pub sha: String,
    pub message: String,
    pub author: String,
}

impl PushEvent {
    /// Parse a GitHub push webhook payload
    pub fn from_github_payload(payload: &serde_json::Value) -> Option<Self> {
        let r#ref = payload.get("ref")?.as_str()?.to_string();
        let before = payload.get("before")?.as_str()?.to_string();
        let after = payload.get("after")?.as_str()?.to_string();
        let repository = RepositoryInfo::from_github_repository(payload.get("repository")?)?;

        let created = payload
            .get("created")
            .and_then(|c| c.as_bool())
            .unwrap_or(false);
        let commits = payload
            .get("commits")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter().map(CommitInfo::from_github_commit).collect()
            })
            .unwrap_or_default();

        let pusher = payload
            .get("pusher")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown")
            .to_string();

        Some(PushEvent {
            r#ref,
            before,
            after,
            created,
            commits,
            repository,
            pusher,
        })
    }

    /// A push that only creates a ref, without new commits, runs nothing.
    pub fn should_skip(&self) -> bool {
        self.created && self.commits.is_empty()
    }

    /// Branch name when the ref is a branch.
    pub fn branch(&self) -> Option<&str> {
        self.r#ref.strip_prefix("refs/heads/")
    }

    /// Short name of the pushed ref: the branch or tag name, else the full ref.
    pub fn ref_name(&self) -> &str {
        self.branch()
            .or_else(|| self.r#ref.strip_prefix("refs/tags/"))
            .unwrap_or(&self.r#ref)
    }
}

impl RepositoryInfo {
    fn from_github_repository(value: &serde_json::Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let clone_url = value.get("clone_url")?.as_str()?.to_string();

        // Push payloads carry `owner.name`; other event types use `owner.login`.
        let owner = value.get("owner").and_then(|o| {
            o.get("login")
                .or_else(|| o.get("name"))
                .and_then(|n| n.as_str())
        })?;

        let full_name = value
            .get("full_name")
            .and_then(|n| n.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("{}/{}", owner, name));

        Some(RepositoryInfo {
            owner: owner.to_string(),
            name,
            full_name,
            clone_url,
        })
    }
}

impl CommitInfo {
    fn from_github_commit(value: &serde_json::Value) -> Self {
        CommitInfo {
            sha: value
                .get("id")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string(),
            message: value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
            author: value
                .get("author")
                .and_then(|a| a.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> serde_json::Value {
        json!({
            "ref": "refs/heads/feature/login",
            "before": "1111111111111111111111111111111111111111",
            "after": "2222222222222222222222222222222222222222",
            "created": false,
            "deleted": false,
            "forced": false,
            "commits": [{
                "id": "2222222222222222222222222222222222222222",
                "message": "Add login form",
                "timestamp": "2025-03-25T12:00:00+01:00",
                "author": { "name": "Ada", "email": "ada@example.com" }
            }],
            "head_commit": {
                "id": "2222222222222222222222222222222222222222",
                "message": "Add login form",
                "author": { "name": "Ada", "email": "ada@example.com" }
            },
            "repository": {
                "name": "widgets",
                "full_name": "octo/widgets",
                "clone_url": "https://github.com/octo/widgets.git",
                "owner": { "name": "octo", "login": "octo" }
            },
            "pusher": { "name": "ada" }
        })
    }

    #[test]
    fn test_parse_push_payload() {
        let event = PushEvent::from_github_payload(&sample_payload()).unwrap();

        assert_eq!(event.r#ref, "refs/heads/feature/login");
        assert_eq!(event.after, "2222222222222222222222222222222222222222");
        assert_eq!(event.repository.owner, "octo");
        assert_eq!(event.repository.name, "widgets");
        assert_eq!(event.repository.clone_url, "https://github.com/octo/widgets.git");
        assert_eq!(event.pusher, "ada");
        assert_eq!(event.commits.len(), 1);
        assert_eq!(event.commits[0].author, "Ada");
        assert_eq!(event.commits[0].message, "Add login form");
        assert_eq!(event.branch(), Some("feature/login"));
        assert_eq!(event.ref_name(), "feature/login");
        assert!(!event.should_skip());
    }

    #[test]
    fn test_owner_falls_back_to_name() {
        let mut payload = sample_payload();
        payload["repository"]["owner"] = json!({ "name": "octo-org" });
        payload["repository"]
            .as_object_mut()
            .unwrap()
            .remove("full_name");

        let event = PushEvent::from_github_payload(&payload).unwrap();
        assert_eq!(event.repository.owner, "octo-org");
        assert_eq!(event.repository.full_name, "octo-org/widgets");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut payload = sample_payload();
        payload.as_object_mut().unwrap().remove("after");
        assert!(PushEvent::from_github_payload(&payload).is_none());

        let mut payload = sample_payload();
        payload["repository"]
            .as_object_mut()
            .unwrap()
            .remove("clone_url");
        assert!(PushEvent::from_github_payload(&payload).is_none());
    }

    #[test]
    fn test_branch_creation_without_commits_is_skipped() {
        let mut payload = sample_payload();
        payload["created"] = json!(true);
        payload["commits"] = json!([]);

        let event = PushEvent::from_github_payload(&payload).unwrap();
        assert!(event.should_skip());
    }

    #[test]
    fn test_branch_creation_with_commits_runs() {
        let mut payload = sample_payload();
        payload["created"] = json!(true);

        let event = PushEvent::from_github_payload(&payload).unwrap();
        assert!(!event.should_skip());
    }

    #[test]
    fn test_tag_ref() {
        let mut payload = sample_payload();
        payload["ref"] = json!("refs/tags/v3.14.1");

        let event = PushEvent::from_github_payload(&payload).unwrap();
        assert_eq!(event.ref_name(), "v3.14.1");
        assert_eq!(event.branch(), None);
    }

    #[test]
    fn test_commits_without_id_still_count() {
        let mut payload = sample_payload();
        payload["created"] = json!(true);
        payload["commits"] = json!([{ "message": "wip" }, {}]);

        let event = PushEvent::from_github_payload(&payload).unwrap();
        assert_eq!(event.commits.len(), 2);
        assert_eq!(event.commits[0].sha, "");
        assert_eq!(event.commits[1].author, "unknown");
        assert!(!event.should_skip());
    }
}
