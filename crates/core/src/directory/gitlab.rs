//! GitLab REST API client for the user directory.
//!
//! Quota rejections (HTTP 429) are not classified here: they surface as a
//! plain [`DirectoryError::Api`], so the GitLab matcher never waits for a
//! reset.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::GitLabDirectory;
use super::{decode_json, error_body, non_empty_token, normalize_base_url};
use crate::errors::DirectoryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Asynchronous GitLab REST API client.
#[derive(Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitLabClient {
    /// Public gitlab.com API endpoint.
    pub const DEFAULT_API_URL: &'static str = "https://gitlab.com/api/v4";

    /// Build a client for `api_url` (gitlab.com when `None`). Without a token
    /// requests are anonymous.
    pub fn new(api_url: Option<&str>, token: Option<&str>) -> Result<Self, DirectoryError> {
        let api_url = normalize_base_url(api_url.unwrap_or(Self::DEFAULT_API_URL))?;
        let token = non_empty_token(token);
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("identmatch/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DirectoryError::ClientBuild(e.to_string()))?;
        info!(api_url = %api_url, authenticated = token.is_some(), "created GitLabClient");
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
            Some(token) => req.header("PRIVATE-TOKEN", token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, DirectoryError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
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
impl GitLabDirectory for GitLabClient {
    #[instrument(skip(self))]
    async fn list_users(&self, search: &str) -> Result<Vec<GitLabUser>, DirectoryError> {
        let req = self.get("/users").query(&[("search", search)]);
        let resp = self.send(req).await?;
        let users: Vec<GitLabUser> = decode_json(resp).await?;
        debug!(count = users.len(), "listed users");
        Ok(users)
    }
}
