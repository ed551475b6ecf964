//! GitHub matcher: resolves emails through the user search API.
//!
//! Lookup order:
//! 1. Placeholder (`noreply`) emails: the login is encoded in the local part,
//!    no request is made.
//! 2. `"<email> in:email"` user search, oldest account first. An empty result
//!    is retried once with the first `@` replaced by a space, since some
//!    accounts are indexed as `user domain`.
//! 3. Profile fetch for the canonical login and display name.
//!
//! Quota rejections are never returned to the caller: the lookup sleeps
//! until the advertised reset and repeats the request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::cancel::race_cancellation;
use super::Matcher;
use crate::context::LookupContext;
use crate::directory::{GitHubClient, GitHubDirectory, SearchOptions};
use crate::errors::{DirectoryError, MatchError};
use crate::models::Identity;

/// Domain GitHub uses for privacy-preserving commit emails.
pub const DEFAULT_NOREPLY_DOMAIN: &str = "users.noreply.github.com";

/// Matches emails to GitHub accounts.
pub struct GitHubMatcher<D: GitHubDirectory = GitHubClient> {
    directory: Arc<D>,
    noreply_suffix: String,
}

impl GitHubMatcher<GitHubClient> {
    /// Create a matcher for `api_url` (github.com when `None`), authenticated
    /// with `token` when one is given.
    pub fn new(api_url: Option<&str>, token: Option<&str>) -> Result<Self, DirectoryError> {
        let client = GitHubClient::new(api_url, token)?;
        Ok(Self::with_directory(Arc::new(client)))
    }
}

impl<D: GitHubDirectory> GitHubMatcher<D> {
    /// Create a matcher over any GitHub-compatible directory.
    pub fn with_directory(directory: Arc<D>) -> Self {
        Self {
            directory,
            noreply_suffix: format!("@{}", DEFAULT_NOREPLY_DOMAIN),
        }
    }

    /// Override the placeholder email domain (GitHub Enterprise hosts use
    /// `users.noreply.<host>`).
    pub fn with_noreply_domain(mut self, domain: &str) -> Self {
        self.noreply_suffix = format!("@{}", domain.trim().trim_start_matches('@'));
        self
    }

    /// Whether `email` is a platform-generated placeholder address.
    pub fn is_noreply_email(&self, email: &str) -> bool {
        let suffix = self.noreply_suffix.as_bytes();
        let email = email.as_bytes();
        email.len() > suffix.len()
            && email[email.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    }
}

/// Extract the login from a placeholder email.
///
/// `foo@users.noreply.github.com` yields `foo`, and the newer
/// `12345+foo@users.noreply.github.com` form also yields `foo`.
pub fn user_from_noreply_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    match local.split('+').nth(1) {
        Some(user) => user.to_string(),
        None => local.to_string(),
    }
}

/// Shortest pause between quota retries, applied when the advertised reset
/// has already passed.
const MIN_QUOTA_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Call `request` until it returns something other than a quota rejection,
/// sleeping until each advertised reset in between.
async fn with_quota_retry<T, F, Fut>(mut request: F) -> Result<T, DirectoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    loop {
        match request().await {
            Err(DirectoryError::RateLimited { reset_at }) => {
                warn!(reset_at = %reset_at, "rate limit was hit, waiting until reset");
                let wait = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait.max(MIN_QUOTA_RETRY_WAIT)).await;
            }
            other => return other,
        }
    }
}

async fn resolve_email<D: GitHubDirectory>(
    directory: Arc<D>,
    email: String,
) -> Result<Identity, MatchError> {
    let dir = directory.as_ref();
    let opts = SearchOptions::most_tenured();
    let opts = &opts;
    let mut query = format!("{} in:email", email);
    let mut fallback_used = false;

    let login = loop {
        let q = query.as_str();
        let result = with_quota_retry(move || dir.search_users(q, opts)).await?;
        if let Some(hit) = result.items.into_iter().find(|u| !u.login.is_empty()) {
            break hit.login;
        }
        if !fallback_used && query.contains('@') {
            query = query.replacen('@', " ", 1);
            fallback_used = true;
            debug!(query = %query, "no users found, retrying without '@'");
            continue;
        }
        warn!(email = %email, "unable to find users for email");
        return Err(MatchError::NoMatches { email });
    };

    let found = login.as_str();
    let user = with_quota_retry(move || dir.get_user(found)).await?;
    let username = if user.login.is_empty() {
        login
    } else {
        user.login
    };
    debug!(email = %email, username = %username, "matched email");
    Ok(Identity::new(username, user.name))
}

async fn resolve_commit<D: GitHubDirectory>(
    directory: Arc<D>,
    email: String,
    repo: String,
    commit: String,
) -> Result<String, MatchError> {
    let dir = directory.as_ref();
    let (r, c) = (repo.as_str(), commit.as_str());
    let found = with_quota_retry(move || dir.get_commit(r, c)).await?;

    if !found.commit.author.email.eq_ignore_ascii_case(&email) {
        warn!(
            email = %email,
            author_email = %found.commit.author.email,
            repo = %repo,
            commit = %commit,
            "commit author email does not match"
        );
        return Err(MatchError::NoMatches { email });
    }

    match found.author {
        Some(author) if !author.login.is_empty() => {
            debug!(email = %email, username = %author.login, "matched commit author");
            Ok(author.login)
        }
        _ => {
            warn!(
                email = %email,
                repo = %repo,
                commit = %commit,
                "commit author has no linked account"
            );
            Err(MatchError::NoMatches { email })
        }
    }
}

#[async_trait]
impl<D: GitHubDirectory> Matcher for GitHubMatcher<D> {
    async fn match_by_email(
        &self,
        ctx: &LookupContext,
        email: &str,
    ) -> Result<Identity, MatchError> {
        if self.is_noreply_email(email) {
            let username = user_from_noreply_email(email);
            if !username.is_empty() {
                debug!(email, username = %username, "resolved placeholder email locally");
                return Ok(Identity::username_only(username));
            }
        }
        race_cancellation(ctx, resolve_email(self.directory.clone(), email.to_string())).await
    }

    fn supports_matching_by_commit(&self) -> bool {
        true
    }

    async fn match_by_commit(
        &self,
        ctx: &LookupContext,
        email: &str,
        repo: &str,
        commit: &str,
    ) -> Result<String, MatchError> {
        race_cancellation(
            ctx,
            resolve_commit(
                self.directory.clone(),
                email.to_string(),
                repo.to_string(),
                commit.to_string(),
            ),
        )
        .await
    }

    fn on_idle(&self) -> Result<(), MatchError> {
        debug!("GitHub matcher idle, nothing to flush");
        Ok(())
    }
}
