//! Read-only object queries backed by gix

use crate::git::error::{GitError, GitResult};
use std::path::Path;

fn open(repo_path: &Path) -> GitResult<gix::Repository> {
    gix::open(repo_path).map_err(|e| GitError::Repository {
        path: repo_path.display().to_string(),
        message: format!("Failed to open repository: {}", e),
    })
}

/// Full hash of the commit `rev` names, or `None` if it cannot be resolved
///
/// Objects are looked up fresh on every call so that fetches made by the git
/// CLI since the last query are visible.
pub fn resolve_commit(repo_path: &Path, rev: &str) -> GitResult<Option<String>> {
    let repo = open(repo_path)?;
    let spec = format!("{}^{{commit}}", rev.trim());
    match repo.rev_parse_single(spec.as_str()) {
        Ok(id) => Ok(Some(id.to_string())),
        Err(e) => {
            log::trace!("{} does not resolve in {}: {}", rev, repo_path.display(), e);
            Ok(None)
        }
    }
}

pub fn commit_exists(repo_path: &Path, sha: &str) -> GitResult<bool> {
    Ok(resolve_commit(repo_path, sha)?.is_some())
}

/// Tree id of the commit `rev` names
pub fn tree_id(repo_path: &Path, rev: &str) -> GitResult<String> {
    let repo = open(repo_path)?;
    let spec = format!("{}^{{tree}}", rev.trim());
    repo.rev_parse_single(spec.as_str())
        .map(|id| id.to_string())
        .map_err(|e| GitError::Repository {
            path: repo_path.display().to_string(),
            message: format!("Failed to resolve tree of {}: {}", rev, e),
        })
}
