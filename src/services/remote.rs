//! Remote GitLab collaborator.
//!
//! [`RemoteClient`] is the capability the sync orchestrator consumes: fetch
//! a milestone, its merge requests, and its issues, and look projects up by
//! name. [`GitLabRemote`] implements it against GitLab API v4.

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Milestone detail from the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMilestone {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub web_url: String,
    #[serde(default)]
    pub closed_at: Option<String>,
}

/// Merge request summary from the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMergeRequest {
    pub id: i64,
    pub iid: i64,
    pub title: String,
    pub description: Option<String>,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
}

/// Issue summary from the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteIssue {
    pub id: i64,
    pub iid: i64,
    pub title: String,
    pub description: Option<String>,
    pub web_url: String,
    #[serde(default)]
    pub project_id: i64,
    #[serde(default)]
    pub closed_at: Option<String>,
}

/// Project summary from the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProject {
    pub id: i64,
    pub name: String,
    pub web_url: String,
}

/// Abstract capability: fetch a milestone's related entities.
///
/// Any call may fail with a transport/auth error, which aborts the sync
/// that issued it.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch one milestone's detail.
    async fn fetch_milestone(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<RemoteMilestone, RemoteError>;

    /// Fetch all merge requests assigned to a milestone.
    async fn fetch_milestone_merge_requests(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<Vec<RemoteMergeRequest>, RemoteError>;

    /// Fetch all issues assigned to a milestone.
    async fn fetch_milestone_issues(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<Vec<RemoteIssue>, RemoteError>;

    /// Look a project up by name. `None` when the remote knows no such
    /// project.
    async fn find_project(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError>;
}

/// GitLab API v4 implementation of [`RemoteClient`].
#[derive(Debug, Clone)]
pub struct GitLabRemote {
    client: Client,
    base_url: String,
}

impl GitLabRemote {
    /// Create a new client from remote settings.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut headers = header::HeaderMap::new();
        let token_value = header::HeaderValue::from_str(&config.token)
            .map_err(|_| RemoteError::InvalidToken)?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.api_url(path);
        let response = self.client.get(&url).send().await?;
        Self::handle_response(response, path).await
    }

    /// Turn a response into a typed payload or a classified error.
    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<T, RemoteError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| RemoteError::Decode(e.to_string()));
        }

        let message = match status {
            StatusCode::UNAUTHORIZED => "token expired or revoked".to_string(),
            StatusCode::FORBIDDEN => "access denied".to_string(),
            StatusCode::NOT_FOUND => "resource not found".to_string(),
            _ => {
                let body = response.text().await.unwrap_or_default();
                serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| {
                        v.get("message")
                            .or_else(|| v.get("error"))
                            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    })
                    .unwrap_or(body)
            }
        };

        Err(RemoteError::Api {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            message,
        })
    }
}

#[async_trait]
impl RemoteClient for GitLabRemote {
    async fn fetch_milestone(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<RemoteMilestone, RemoteError> {
        self.get_json(&format!(
            "/projects/{}/milestones/{}",
            project_id, milestone_id
        ))
        .await
    }

    async fn fetch_milestone_merge_requests(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<Vec<RemoteMergeRequest>, RemoteError> {
        self.get_json(&format!(
            "/projects/{}/milestones/{}/merge_requests?per_page=100",
            project_id, milestone_id
        ))
        .await
    }

    async fn fetch_milestone_issues(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<Vec<RemoteIssue>, RemoteError> {
        self.get_json(&format!(
            "/projects/{}/milestones/{}/issues?per_page=100",
            project_id, milestone_id
        ))
        .await
    }

    async fn find_project(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError> {
        let projects: Vec<RemoteProject> = self
            .get_json(&format!(
                "/projects?search={}&membership=true",
                urlencoding::encode(name)
            ))
            .await?;
        Ok(projects.into_iter().find(|p| p.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> GitLabRemote {
        GitLabRemote::new(&RemoteConfig {
            base_url: "https://gitlab.example.com/".to_string(),
            token: "glpat-test".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_strips_trailing_slash() {
        assert_eq!(
            remote().api_url("/projects/1/milestones/7"),
            "https://gitlab.example.com/api/v4/projects/1/milestones/7"
        );
    }

    #[test]
    fn test_invalid_token_rejected() {
        let err = GitLabRemote::new(&RemoteConfig {
            base_url: "https://gitlab.example.com".to_string(),
            token: "bad\ntoken".to_string(),
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidToken));
    }

    #[test]
    fn test_remote_merge_request_decodes_api_shape() {
        let mr: RemoteMergeRequest = serde_json::from_str(
            r#"{
                "id": 100, "iid": 9, "title": "Fix login",
                "description": "Closes #42",
                "web_url": "https://gitlab.example.com/g/p/-/merge_requests/9",
                "source_branch": "feature/x-5", "target_branch": "develop",
                "state": "opened", "author": {"id": 1}
            }"#,
        )
        .unwrap();
        assert_eq!(mr.iid, 9);
        assert_eq!(mr.description.as_deref(), Some("Closes #42"));
    }
}
