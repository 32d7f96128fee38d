//! Commit replay engine
//!
//! Rebuilds a commit that is missing from a mirror by walking its single-parent
//! ancestry through the commit-source API until a locally known ancestor is
//! found, then re-applying the fetched patches on top of that ancestor. The
//! result has the original tree and author but a fixed replay committer, so
//! its hash (the effective SHA) differs from the requested one.

pub mod apply;
pub mod error;
pub mod plan;
pub mod source;

pub use apply::{apply_replay_plan, REPLAY_COMMITTER_EMAIL, REPLAY_COMMITTER_NAME};
pub use error::{ReplayError, ReplayResult};
pub use plan::{build_replay_plan, ReplayCommit, ReplayPlan, DEFAULT_MAX_PARENT_HOPS};
pub use source::CommitSource;

#[cfg(test)]
pub(crate) mod tests;
