//! GitLab matcher: resolves emails through the user listing API.
//!
//! Simpler than the GitHub matcher: one search request in the backend's
//! default order (not oldest-account-first), no placeholder emails, no query
//! fallback and no display name. Quota rejections are not retried; they come
//! back as a plain directory error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::cancel::race_cancellation;
use super::Matcher;
use crate::context::LookupContext;
use crate::directory::{GitLabClient, GitLabDirectory};
use crate::errors::{DirectoryError, MatchError};
use crate::models::Identity;

/// Matches emails to GitLab accounts.
pub struct GitLabMatcher<D: GitLabDirectory = GitLabClient> {
    directory: Arc<D>,
}

impl GitLabMatcher<GitLabClient> {
    /// Create a matcher for `api_url` (gitlab.com when `None`), authenticated
    /// with `token` when one is given.
    pub fn new(api_url: Option<&str>, token: Option<&str>) -> Result<Self, DirectoryError> {
        let client = GitLabClient::new(api_url, token)?;
        Ok(Self::with_directory(Arc::new(client)))
    }
}

impl<D: GitLabDirectory> GitLabMatcher<D> {
    /// Create a matcher over any GitLab-compatible directory.
    pub fn with_directory(directory: Arc<D>) -> Self {
        Self { directory }
    }
}

async fn resolve_email<D: GitLabDirectory>(
    directory: Arc<D>,
    email: String,
) -> Result<Identity, MatchError> {
    let users = directory.list_users(&email).await?;
    match users.into_iter().find(|u| !u.username.is_empty()) {
        Some(user) => {
            debug!(email = %email, username = %user.username, "matched email");
            Ok(Identity::username_only(user.username))
        }
        None => {
            warn!(email = %email, "unable to find users for email");
            Err(MatchError::NoMatches { email })
        }
    }
}

#[async_trait]
impl<D: GitLabDirectory> Matcher for GitLabMatcher<D> {
    async fn match_by_email(
        &self,
        ctx: &LookupContext,
        email: &str,
    ) -> Result<Identity, MatchError> {
        race_cancellation(ctx, resolve_email(self.directory.clone(), email.to_string())).await
    }

    fn supports_matching_by_commit(&self) -> bool {
        false
    }

    async fn match_by_commit(
        &self,
        _ctx: &LookupContext,
        _email: &str,
        _repo: &str,
        _commit: &str,
    ) -> Result<String, MatchError> {
        Err(MatchError::NotImplemented)
    }

    fn on_idle(&self) -> Result<(), MatchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::GitLabUser;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeGitLab {
        users: Vec<GitLabUser>,
        error_status: Option<u16>,
        hang: bool,
        searches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GitLabDirectory for FakeGitLab {
        async fn list_users(&self, search: &str) -> Result<Vec<GitLabUser>, DirectoryError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.searches.lock().unwrap().push(search.to_string());
            if let Some(status) = self.error_status {
                return Err(DirectoryError::Api {
                    status,
                    body: "error".into(),
                });
            }
            Ok(self.users.clone())
        }
    }

    fn user(username: &str) -> GitLabUser {
        GitLabUser {
            id: 1,
            username: username.to_string(),
            name: Some("Somebody".into()),
            state: Some("active".into()),
        }
    }

    fn matcher(fake: FakeGitLab) -> (GitLabMatcher<FakeGitLab>, Arc<FakeGitLab>) {
        let fake = Arc::new(fake);
        (GitLabMatcher::with_directory(fake.clone()), fake)
    }

    #[tokio::test]
    async fn test_first_user_without_display_name() {
        let (m, fake) = matcher(FakeGitLab {
            users: vec![user("jdoe"), user("jdoe2")],
            ..Default::default()
        });
        let identity = m
            .match_by_email(&LookupContext::background(), "jdoe@example.com")
            .await
            .unwrap();
        assert_eq!(identity, Identity::username_only("jdoe"));
        assert_eq!(
            *fake.searches.lock().unwrap(),
            vec!["jdoe@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_users_is_no_matches_without_fallback() {
        let (m, fake) = matcher(FakeGitLab::default());
        let err = m
            .match_by_email(&LookupContext::background(), "ghost@example.com")
            .await
            .unwrap_err();
        assert!(err.is_no_matches());
        assert_eq!(fake.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_email_is_searched() {
        let (m, fake) = matcher(FakeGitLab {
            users: vec![user("foo")],
            ..Default::default()
        });
        m.match_by_email(&LookupContext::background(), "1+foo@users.noreply.github.com")
            .await
            .unwrap();
        assert_eq!(fake.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_rejection_surfaces_as_api_error() {
        let (m, fake) = matcher(FakeGitLab {
            error_status: Some(429),
            ..Default::default()
        });
        let err = m
            .match_by_email(&LookupContext::background(), "jdoe@example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::Directory(DirectoryError::Api { status: 429, .. })
        ));
        assert_eq!(fake.searches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_matching_unsupported() {
        let (m, _) = matcher(FakeGitLab {
            users: vec![user("jdoe")],
            ..Default::default()
        });
        assert!(!m.supports_matching_by_commit());
        for (email, repo, commit) in [
            ("jdoe@example.com", "group/project", "abc123"),
            ("", "", ""),
        ] {
            let err = m
                .match_by_commit(&LookupContext::background(), email, repo, commit)
                .await
                .unwrap_err();
            assert!(matches!(err, MatchError::NotImplemented));
        }
        assert!(m.on_idle().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_beats_slow_backend() {
        let (m, _) = matcher(FakeGitLab {
            hang: true,
            ..Default::default()
        });
        let (ctx, handle) = LookupContext::with_cancel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            m.match_by_email(&ctx, "jdoe@example.com"),
        )
        .await
        .expect("cancellation should end the lookup");
        assert!(matches!(out, Err(MatchError::Canceled)));
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let (m, _) = matcher(FakeGitLab {
            users: vec![user("jdoe")],
            ..Default::default()
        });
        let ctx = LookupContext::background();
        let first = m.match_by_email(&ctx, "jdoe@example.com").await.unwrap();
        let second = m.match_by_email(&ctx, "jdoe@example.com").await.unwrap();
        assert_eq!(first, second);
    }
}
