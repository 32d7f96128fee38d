//! Per-project git workspaces
//!
//! One persistent mirror per project, one disposable worktree per scan
//! attempt, and an advisory file lock serialising every mirror mutation.

pub mod error;
pub mod lock;
pub mod manager;
pub mod url;

pub use error::{WorkspaceError, WorkspaceResult};
pub use lock::{LockEvent, LockObserver, DEFAULT_LOCK_TIMEOUT};
pub use manager::{MaterializedCommit, ProjectWorkspace, WorkspaceManager, DEFAULT_FORK_BASE_URL};
pub use url::normalize_repo_url;

#[cfg(test)]
pub(crate) mod tests;
