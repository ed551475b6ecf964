//! Domain model types shared by the matchers, the configuration layer and
//! the CLI.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A platform account resolved from a commit author email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Platform login. Never empty on a successful lookup.
    pub username: String,
    /// Profile display name, when the backend exposes one.
    pub display_name: Option<String>,
}

impl Identity {
    /// An identity with no display name.
    pub fn username_only(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
        }
    }

    /// Build an identity, mapping an empty display name to `None`.
    pub fn new(username: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.filter(|n| !n.trim().is_empty()),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", self.username, name),
            None => write!(f, "{}", self.username),
        }
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Hosted code platform a matcher talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    GitHub,
    GitLab,
}

impl std::str::FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(ConfigError::InvalidValue {
                field: "platform".into(),
                detail: format!("unknown platform '{}', expected github or gitlab", other),
            }),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "github"),
            Self::GitLab => write!(f, "gitlab"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_drops_blank_display_name() {
        let identity = Identity::new("octocat", Some("  ".into()));
        assert_eq!(identity.display_name, None);
        assert_eq!(identity.to_string(), "octocat");

        let identity = Identity::new("octocat", Some("The Octocat".into()));
        assert_eq!(identity.to_string(), "octocat (The Octocat)");
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("GitHub".parse::<Platform>().unwrap(), Platform::GitHub);
        assert_eq!(" gitlab ".parse::<Platform>().unwrap(), Platform::GitLab);
        assert!("bitbucket".parse::<Platform>().is_err());
        assert_eq!(Platform::GitLab.to_string(), "gitlab");
    }
}
