//! Git error types

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("`{command}` failed ({status}): {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("Could not run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository error at {path}: {message}")]
    Repository { path: String, message: String },
}

pub type GitResult<T> = Result<T, GitError>;
