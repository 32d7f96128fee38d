//! Git access shared by the replay engine and the workspace manager
//!
//! Mutating operations (clone, fetch, worktree, apply, commit) go through the
//! git CLI; read-only object lookups use gix.

pub mod command;
pub mod error;
pub mod objects;

pub use command::{GitCommand, GitOutput};
pub use error::{GitError, GitResult};
pub use objects::{commit_exists, resolve_commit, tree_id};

#[cfg(test)]
pub(crate) mod test_support;
