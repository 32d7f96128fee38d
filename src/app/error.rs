//! Errors surfaced by the binary

use crate::app::cli::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::github::GithubError;
use crate::jobs::CoordinatorError;
use crate::scanner::ScannerError;
use crate::workspace::WorkspaceError;
use std::path::PathBuf;

/// Exit status for configuration and argument errors
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Scanner(#[from] ScannerError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Interrupted before scan job {job_id} finished")]
    Interrupted { job_id: String },
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config(e) => e.user_message(),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
