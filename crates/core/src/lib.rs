//! identmatch core library.
//!
//! Resolves a commit author's email address to an account on a hosted code
//! platform (GitHub or GitLab): configuration, the directory REST
//! transports, the [`Matcher`] contract with one backend per platform, and
//! cancellable lookups.

pub mod config;
pub mod context;
pub mod directory;
pub mod errors;
pub mod matcher;
pub mod models;

// Re-exports for convenience.
pub use config::AppConfig;
pub use context::{CancelHandle, LookupContext};
pub use errors::{CoreError, MatchError};
pub use matcher::{matcher_from_config, new_matcher, GitHubMatcher, GitLabMatcher, Matcher};
pub use models::{Identity, Platform};
