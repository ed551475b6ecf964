//! GitHub REST API client for the user directory.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{decode_json, error_body, non_empty_token, normalize_base_url, rate_limit_reset};
use super::GitHubDirectory;
use crate::errors::DirectoryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUserSummary {
    pub login: String,
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersSearchResult {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<GitHubUserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub commit: GitHubCommitDetail,
    pub author: Option<GitHubUserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: String,
    pub author: GitHubGitActor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubGitActor {
    pub name: String,
    pub email: String,
    pub date: Option<String>,
}

/// Query parameters for `GET /search/users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub sort: &'static str,
    pub order: &'static str,
    pub per_page: u32,
}

impl SearchOptions {
    /// One result, oldest account first: when several accounts list the same
    /// email the longest-tenured one wins.
    pub fn most_tenured() -> Self {
        Self {
            sort: "joined",
            order: "asc",
            per_page: 1,
        }
    }
}

/// Asynchronous GitHub REST API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Public github.com API endpoint.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Build a client for `api_url` (github.com when `None`). Without a token
    /// requests are anonymous.
    pub fn new(api_url: Option<&str>, token: Option<&str>) -> Result<Self, DirectoryError> {
        let api_url = normalize_base_url(api_url.unwrap_or(Self::DEFAULT_API_URL))?;
        let token = non_empty_token(token);
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("identmatch/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DirectoryError::ClientBuild(e.to_string()))?;
        info!(api_url = %api_url, authenticated = token.is_some(), "created GitHubClient");
        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    /// The normalized API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self.http.get(format!("{}{}", self.api_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, DirectoryError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if let Some(reset_at) = rate_limit_reset(status, resp.headers(), Utc::now()) {
            return Err(DirectoryError::RateLimited { reset_at });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DirectoryError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        Err(DirectoryError::Api {
            status: status.as_u16(),
            body: error_body(resp).await,
        })
    }
}

#[async_trait]
impl GitHubDirectory for GitHubClient {
    #[instrument(skip(self, opts))]
    async fn search_users(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<UsersSearchResult, DirectoryError> {
        let per_page = opts.per_page.to_string();
        let req = self.get("/search/users").query(&[
            ("q", query),
            ("sort", opts.sort),
            ("order", opts.order),
            ("per_page", per_page.as_str()),
        ]);
        let resp = self.send(req).await?;
        let result: UsersSearchResult = decode_json(resp).await?;
        debug!(total = result.total_count, returned = result.items.len(), "searched users");
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn get_user(&self, login: &str) -> Result<GitHubUser, DirectoryError> {
        let resp = self.send(self.get(&format!("/users/{}", login))).await?;
        let user: GitHubUser = decode_json(resp).await?;
        debug!(login = %user.login, "fetched user");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_commit(&self, repo: &str, sha: &str) -> Result<GitHubCommit, DirectoryError> {
        let resp = self
            .send(self.get(&format!("/repos/{}/commits/{}", repo, sha)))
            .await?;
        let commit: GitHubCommit = decode_json(resp).await?;
        debug!(sha = %commit.sha, linked = commit.author.is_some(), "fetched commit");
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_url() {
        let client = GitHubClient::new(None, None).unwrap();
        assert_eq!(client.api_url(), "https://api.github.com");
        assert!(client.token.is_none());
    }

    #[test]
    fn test_enterprise_url_and_token() {
        let client =
            GitHubClient::new(Some("https://ghe.example.com/api/v3/"), Some("ghp_abc")).unwrap();
        assert_eq!(client.api_url(), "https://ghe.example.com/api/v3");
        assert_eq!(client.token.as_deref(), Some("ghp_abc"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            GitHubClient::new(Some("::nope"), None),
            Err(DirectoryError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_most_tenured_options() {
        let opts = SearchOptions::most_tenured();
        assert_eq!(opts.per_page, 1);
        assert_eq!(opts.sort, "joined");
        assert_eq!(opts.order, "asc");
    }
}
