//! GitHub API error types

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, thiserror::Error)]
pub enum GithubError {
    #[error("All GitHub credentials are cooling down until {retry_at}")]
    Exhausted { retry_at: DateTime<Utc> },

    #[error("No usable GitHub credentials configured")]
    NoCredentials,

    #[error("GitHub API error {status} for {path}: {snippet}")]
    Api {
        status: u16,
        path: String,
        snippet: String,
    },

    #[error("All GitHub API attempts failed: {message}")]
    Transport { message: String },

    #[error("Could not decode GitHub response for {path}: {message}")]
    Decode { path: String, message: String },

    #[error("{0}")]
    Internal(String),
}

impl GithubError {
    /// Earliest time a retry can succeed, when the failure is credential exhaustion
    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GithubError::Exhausted { retry_at } => Some(*retry_at),
            _ => None,
        }
    }

    /// True when the API reported the requested object does not exist
    ///
    /// GitHub answers 422 for SHAs it cannot resolve in the repository.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::Api { status: 404 | 422, .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GithubError::Exhausted { .. })
    }
}

impl crate::core::error_handling::ContextualError for GithubError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, GithubError::NoCredentials)
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            GithubError::NoCredentials => {
                Some("No usable GitHub credentials: set github.tokens or GITHUB_TOKENS")
            }
            _ => None,
        }
    }
}

pub type GithubResult<T> = Result<T, GithubError>;
