//! Email-to-account matching against hosted code platforms.
//!
//! Every platform backend implements [`Matcher`]. Backends differ in what
//! they can do: callers must check
//! [`supports_matching_by_commit`](Matcher::supports_matching_by_commit)
//! before calling [`match_by_commit`](Matcher::match_by_commit).
//!
//! Each lookup runs as its own task and is raced against the caller's
//! [`LookupContext`]; see [`cancel::race_cancellation`].

pub mod cancel;
pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use tracing::info;

use crate::config::AppConfig;
use crate::context::LookupContext;
use crate::errors::{DirectoryError, MatchError};
use crate::models::{Identity, Platform};

pub use github::GitHubMatcher;
pub use gitlab::GitLabMatcher;

/// Resolves commit author emails to platform accounts.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Find the account that owns `email`.
    async fn match_by_email(
        &self,
        ctx: &LookupContext,
        email: &str,
    ) -> Result<Identity, MatchError>;

    /// Whether [`match_by_commit`](Self::match_by_commit) is available.
    fn supports_matching_by_commit(&self) -> bool;

    /// Find the login of the account that authored `commit` in `repo`, as
    /// long as the commit's author email is `email`. Fails with
    /// [`MatchError::NotImplemented`] on backends without the capability.
    async fn match_by_commit(
        &self,
        ctx: &LookupContext,
        email: &str,
        repo: &str,
        commit: &str,
    ) -> Result<String, MatchError>;

    /// Housekeeping hook for callers to invoke between lookups.
    fn on_idle(&self) -> Result<(), MatchError>;
}

/// Build the matcher for `platform` with an optional base URL and token.
pub fn new_matcher(
    platform: Platform,
    api_url: Option<&str>,
    token: Option<&str>,
) -> Result<Box<dyn Matcher>, DirectoryError> {
    info!(%platform, "creating matcher");
    Ok(match platform {
        Platform::GitHub => Box::new(GitHubMatcher::new(api_url, token)?),
        Platform::GitLab => Box::new(GitLabMatcher::new(api_url, token)?),
    })
}

/// Build the matcher for `platform` from resolved configuration.
pub fn matcher_from_config(
    config: &AppConfig,
    platform: Platform,
) -> Result<Box<dyn Matcher>, DirectoryError> {
    info!(%platform, "creating matcher from configuration");
    Ok(match platform {
        Platform::GitHub => Box::new(
            GitHubMatcher::new(Some(&config.github.api_url), config.github.token.as_deref())?
                .with_noreply_domain(&config.github.noreply_domain),
        ),
        Platform::GitLab => Box::new(GitLabMatcher::new(
            Some(&config.gitlab.api_url),
            config.gitlab.token.as_deref(),
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_platform() {
        let github = new_matcher(Platform::GitHub, None, None).unwrap();
        assert!(github.supports_matching_by_commit());

        let gitlab = new_matcher(Platform::GitLab, None, Some("glpat-x")).unwrap();
        assert!(!gitlab.supports_matching_by_commit());
    }

    #[test]
    fn test_bad_url_rejected() {
        assert!(matches!(
            new_matcher(Platform::GitLab, Some("nope"), None),
            Err(DirectoryError::InvalidBaseUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_config_noreply_domain_applies() {
        let mut config = AppConfig::default();
        config.github.noreply_domain = "users.noreply.ghe.example.com".into();
        let matcher = matcher_from_config(&config, Platform::GitHub).unwrap();
        let identity = matcher
            .match_by_email(
                &LookupContext::background(),
                "42+octo@users.noreply.ghe.example.com",
            )
            .await
            .unwrap();
        assert_eq!(identity.username, "octo");
    }

    #[tokio::test]
    async fn test_gitlab_commit_matching_through_trait_object() {
        let config = AppConfig::default();
        let matcher = matcher_from_config(&config, Platform::GitLab).unwrap();
        let err = matcher
            .match_by_commit(&LookupContext::background(), "a@b.c", "g/p", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::NotImplemented));
    }
}
