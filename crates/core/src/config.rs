//! TOML-based configuration for identmatch.
//!
//! Access tokens are never stored in the file. Each platform section names
//! the environment variable holding its token (`token_env`), and the value is
//! resolved at runtime via [`AppConfig::resolve_env_vars`]. A platform
//! without a resolved token is queried anonymously.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::directory::{normalize_base_url, GitHubClient, GitLabClient};
use crate::errors::ConfigError;
use crate::matcher::github::DEFAULT_NOREPLY_DOMAIN;
use crate::models::Platform;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lookup behaviour.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// GitLab API settings.
    #[serde(default)]
    pub gitlab: GitLabConfig,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            lookup: LookupConfig::default(),
            github: GitHubConfig::default(),
            gitlab: GitLabConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Settings applied to every lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Deadline for a single lookup in seconds (default 30, 0 disables it).
    /// Quota-reset waits count against this deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Platform used when the caller does not pick one.
    #[serde(default)]
    pub default_platform: Platform,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_platform: Platform::default(),
        }
    }
}

impl LookupConfig {
    /// The lookup deadline, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Environment variable holding the GitHub personal access token.
    #[serde(default = "default_github_token_env")]
    pub token_env: Option<String>,

    /// Domain of placeholder commit emails (default
    /// `users.noreply.github.com`).
    #[serde(default = "default_noreply_domain")]
    pub noreply_domain: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    GitHubClient::DEFAULT_API_URL.into()
}
fn default_github_token_env() -> Option<String> {
    Some("GITHUB_TOKEN".into())
}
fn default_noreply_domain() -> String {
    DEFAULT_NOREPLY_DOMAIN.into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token_env: default_github_token_env(),
            noreply_domain: default_noreply_domain(),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GitLab
// ---------------------------------------------------------------------------

/// GitLab API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// GitLab API base URL (default `https://gitlab.com/api/v4`).
    #[serde(default = "default_gitlab_api_url")]
    pub api_url: String,

    /// Environment variable holding the GitLab personal access token.
    #[serde(default = "default_gitlab_token_env")]
    pub token_env: Option<String>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_gitlab_api_url() -> String {
    GitLabClient::DEFAULT_API_URL.into()
}
fn default_gitlab_token_env() -> Option<String> {
    Some("GITLAB_TOKEN".into())
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            api_url: default_gitlab_api_url(),
            token_env: default_gitlab_token_env(),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `token_env` references from environment variables.
    ///
    /// Missing variables are not an error: the platform is then queried
    /// anonymously, with a much lower request quota.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        debug!("resolving environment variable references in config");

        if let Some(ref env_name) = self.github.token_env {
            self.github.token = resolve_optional_env(env_name, "github.token_env");
        }

        if let Some(ref env_name) = self.gitlab.token_env {
            self.gitlab.token = resolve_optional_env(env_name, "gitlab.token_env");
        }

        Ok(())
    }

    /// Validate that all values are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, url) in [
            ("github.api_url", &self.github.api_url),
            ("gitlab.api_url", &self.gitlab.api_url),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "API URL must not be empty".into(),
                });
            }
            normalize_base_url(url).map_err(|e| ConfigError::InvalidValue {
                field: field.into(),
                detail: e.to_string(),
            })?;
        }

        let domain = self.github.noreply_domain.trim();
        if domain.is_empty() || domain.contains('@') || domain.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "github.noreply_domain".into(),
                detail: "must be a bare domain such as users.noreply.github.com".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success and `None` if the variable is unset or empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty, using anonymous access");
            None
        }
        Err(_) => {
            debug!(field, env_name, "env var not set, using anonymous access");
            None
        }
    }
}
