//! REST transports for the platform user directories.
//!
//! The matchers depend on the [`GitHubDirectory`] and [`GitLabDirectory`]
//! traits rather than on the concrete reqwest clients, so lookups can be
//! exercised against in-memory fakes.

pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::errors::DirectoryError;

pub use github::{
    GitHubClient, GitHubCommit, GitHubCommitDetail, GitHubGitActor, GitHubUser,
    GitHubUserSummary, SearchOptions, UsersSearchResult,
};
pub use gitlab::{GitLabClient, GitLabUser};

/// Wait applied to a quota rejection that carries no usable reset hint.
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 60;

/// User search, profile and commit endpoints of a GitHub-compatible API.
#[async_trait]
pub trait GitHubDirectory: Send + Sync + 'static {
    /// `GET /search/users`.
    async fn search_users(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<UsersSearchResult, DirectoryError>;

    /// `GET /users/{login}`.
    async fn get_user(&self, login: &str) -> Result<GitHubUser, DirectoryError>;

    /// `GET /repos/{repo}/commits/{sha}`.
    async fn get_commit(&self, repo: &str, sha: &str) -> Result<GitHubCommit, DirectoryError>;
}

/// User listing endpoint of a GitLab-compatible API.
#[async_trait]
pub trait GitLabDirectory: Send + Sync + 'static {
    /// `GET /users?search=...`.
    async fn list_users(&self, search: &str) -> Result<Vec<GitLabUser>, DirectoryError>;
}

/// Validate an API base URL and strip any trailing slash.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, DirectoryError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| DirectoryError::InvalidBaseUrl {
        url: raw.to_string(),
        detail: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(DirectoryError::InvalidBaseUrl {
            url: raw.to_string(),
            detail: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Treat an empty token the same as no token.
pub(crate) fn non_empty_token(token: Option<&str>) -> Option<String> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Work out when an exhausted quota resets, or `None` if the response is not
/// a quota rejection.
///
/// GitHub signals primary limits with `x-ratelimit-remaining: 0` plus an
/// epoch-seconds `x-ratelimit-reset`, and secondary limits with
/// `retry-after`.
pub(crate) fn rate_limit_reset(
    status: StatusCode,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    };

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    if exhausted {
        if let Some(reset) = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        {
            return Some(reset);
        }
    }

    if let Some(secs) = header("retry-after").and_then(|v| v.parse::<i64>().ok()) {
        return Some(now + Duration::seconds(secs.max(0)));
    }

    // An exhausted quota is a rate limit even without a usable reset hint.
    if exhausted || status == StatusCode::TOO_MANY_REQUESTS {
        return Some(now + Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS));
    }

    None
}

/// Read a successful response body as JSON, mapping malformed payloads to
/// [`DirectoryError::Parse`].
pub(crate) async fn decode_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, DirectoryError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| DirectoryError::Parse(e.to_string()))
}

/// Read the body of a failed response for inclusion in an error.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.github.com/").unwrap(),
            "https://api.github.com"
        );
        assert_eq!(
            normalize_base_url("https://ghe.example.com/api/v3").unwrap(),
            "https://ghe.example.com/api/v3"
        );
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(DirectoryError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            normalize_base_url("ftp://example.com"),
            Err(DirectoryError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_non_empty_token() {
        assert_eq!(non_empty_token(None), None);
        assert_eq!(non_empty_token(Some("  ")), None);
        assert_eq!(non_empty_token(Some("ghp_x")), Some("ghp_x".into()));
    }

    #[test]
    fn test_primary_rate_limit_uses_reset_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1717243500"));
        let reset = rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()).unwrap();
        assert_eq!(reset.timestamp(), 1_717_243_500);
    }

    #[test]
    fn test_secondary_rate_limit_uses_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));
        let reset = rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()).unwrap();
        assert_eq!(reset, now() + Duration::seconds(30));
    }

    #[test]
    fn test_bare_429_waits_default() {
        let reset = rate_limit_reset(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), now());
        assert_eq!(
            reset,
            Some(now() + Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS))
        );
    }

    #[test]
    fn test_exhausted_quota_without_reset_waits_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert_eq!(
            rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()),
            Some(now() + Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS))
        );

        headers.insert("x-ratelimit-reset", HeaderValue::from_static("soon"));
        assert_eq!(
            rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()),
            Some(now() + Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS))
        );

        headers.insert("retry-after", HeaderValue::from_static("5"));
        assert_eq!(
            rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()),
            Some(now() + Duration::seconds(5))
        );
    }

    #[test]
    fn test_plain_forbidden_is_not_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        assert_eq!(rate_limit_reset(StatusCode::FORBIDDEN, &headers, now()), None);
        assert_eq!(
            rate_limit_reset(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), now()),
            None
        );
    }
}
