//! Error types for the identmatch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Matcher errors
// ---------------------------------------------------------------------------

/// Errors returned to callers of a [`Matcher`](crate::matcher::Matcher).
#[derive(Debug, Error)]
pub enum MatchError {
    /// The directory search completed but found no candidate accounts.
    #[error("no matches found for email '{email}'")]
    NoMatches {
        email: String,
    },

    /// The caller's cancellation signal fired (or its deadline passed) before
    /// the lookup finished.
    #[error("lookup canceled")]
    Canceled,

    /// The backend does not support the requested capability.
    #[error("not implemented")]
    NotImplemented,

    /// Any other directory failure, surfaced unchanged.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The background lookup task panicked or was torn down by the runtime.
    #[error("lookup task failed: {0}")]
    TaskFailed(String),
}

impl MatchError {
    /// Whether the lookup simply found nobody, so trying another backend
    /// makes sense.
    pub fn is_no_matches(&self) -> bool {
        matches!(self, Self::NoMatches { .. })
    }
}

// ---------------------------------------------------------------------------
// Directory service errors
// ---------------------------------------------------------------------------

/// Errors from the GitHub / GitLab REST transports.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("directory HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("directory API error (HTTP {status}): {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// Authentication token is missing, invalid or lacks scope.
    #[error("directory authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The request quota is exhausted until `reset_at`.
    #[error("directory rate limit exceeded, resets at {reset_at}")]
    RateLimited {
        reset_at: DateTime<Utc>,
    },

    /// JSON deserialization failure.
    #[error("directory response parse error: {0}")]
    Parse(String),

    /// The configured API base URL is not an absolute http(s) URL.
    #[error("invalid directory base URL '{url}': {detail}")]
    InvalidBaseUrl {
        url: String,
        detail: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_display_messages() {
        let err = MatchError::NoMatches {
            email: "jdoe@example.com".into(),
        };
        assert_eq!(
            err.to_string(),
            "no matches found for email 'jdoe@example.com'"
        );

        assert_eq!(MatchError::Canceled.to_string(), "lookup canceled");
        assert_eq!(MatchError::NotImplemented.to_string(), "not implemented");

        let reset_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let err = DirectoryError::RateLimited { reset_at };
        assert!(err.to_string().contains("rate limit"));

        let err = ConfigError::InvalidValue {
            field: "github.api_url".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("github.api_url"));
    }

    #[test]
    fn test_directory_error_is_transparent() {
        let err: MatchError = DirectoryError::Api {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert_eq!(err.to_string(), "directory API error (HTTP 500): boom");
        assert!(!err.is_no_matches());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = MatchError::Canceled.into();
        assert!(matches!(core_err, CoreError::Match(MatchError::Canceled)));

        let core_err: CoreError = ConfigError::FileNotFound("x.toml".into()).into();
        assert!(matches!(core_err, CoreError::Config(_)));
    }
}
