//! Scanner Error Types

use crate::workspace::WorkspaceError;
use std::path::PathBuf;

/// Characters of scanner output kept in error messages
const OUTPUT_TAIL_CHARS: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("Scanner executable {program} could not be started: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scanner failed ({status}): {}", output_tail(.output))]
    Failed { status: String, output: String },

    #[error("Scanner timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("Scan target request to {url} failed: {message}")]
    Target {
        url: String,
        /// `None` when no HTTP response was received
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to archive log at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl ScannerError {
    /// Captured scanner output, when the process ran
    pub fn output(&self) -> Option<&str> {
        match self {
            ScannerError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Last part of a long scanner log, cut on a character boundary
pub fn output_tail(output: &str) -> &str {
    let count = output.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return output;
    }
    let skip = count - OUTPUT_TAIL_CHARS;
    match output.char_indices().nth(skip) {
        Some((index, _)) => &output[index..],
        None => output,
    }
}

pub type ScannerResult<T> = Result<T, ScannerError>;
