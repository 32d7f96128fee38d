//! Scan log archive keyed by instance, project and commit

use crate::scanner::error::{ScannerError, ScannerResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LogKind {
    #[strum(serialize = "scan.log")]
    Scan,
    #[strum(serialize = "error.log")]
    Error,
}

/// `<instance>/<project_key>/<commit_sha>/<scan|error>.log`
pub fn log_key(instance: &str, project_key: &str, commit_sha: &str, kind: LogKind) -> String {
    format!("{}/{}/{}/{}", instance, project_key, commit_sha, kind)
}

#[async_trait]
pub trait LogArchive: Send + Sync {
    /// Store `content`; returns the archive key
    async fn store(
        &self,
        instance: &str,
        project_key: &str,
        commit_sha: &str,
        kind: LogKind,
        content: &str,
    ) -> ScannerResult<String>;
}

/// Archive rooted in a local directory
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .map(|part| part.replace("..", "_"))
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl LogArchive for DirectoryArchive {
    async fn store(
        &self,
        instance: &str,
        project_key: &str,
        commit_sha: &str,
        kind: LogKind,
        content: &str,
    ) -> ScannerResult<String> {
        let key = log_key(instance, project_key, commit_sha, kind);
        let path = self.path_for(&key);
        let archive_error = |source| ScannerError::Archive {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(archive_error)?;
        }
        tokio::fs::write(&path, content).await.map_err(archive_error)?;
        log::debug!("Archived {} ({} bytes)", key, content.len());
        Ok(key)
    }
}
