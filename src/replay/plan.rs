//! Ancestry walk that turns a missing commit into an ordered replay plan

use crate::github::GithubError;
use crate::replay::error::{ReplayError, ReplayResult};
use crate::replay::source::CommitSource;
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_MAX_PARENT_HOPS: usize = 50;

/// One commit to re-create: its patch plus the original author identity
#[derive(Debug, Clone, Serialize)]
pub struct ReplayCommit {
    pub sha: String,
    #[serde(skip)]
    pub patch: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_date: Option<String>,
}

/// Base commit present locally plus the commits to apply on it, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct ReplayPlan {
    pub base_sha: String,
    pub commits: Vec<ReplayCommit>,
}

impl ReplayPlan {
    /// The commit the plan recreates (the newest one)
    pub fn target_sha(&self) -> &str {
        self.commits
            .last()
            .map(|commit| commit.sha.as_str())
            .unwrap_or(self.base_sha.as_str())
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Walk from `target_sha` towards a locally present ancestor
///
/// `is_local` answers whether a SHA already exists in the mirror. At most
/// `max_depth` commits are fetched. Credential exhaustion is reported as
/// `CredentialsExhausted`; every other API failure means the commit cannot be
/// replayed (`MissingCommit`).
pub async fn build_replay_plan<F>(
    source: &dyn CommitSource,
    slug: &str,
    target_sha: &str,
    max_depth: usize,
    mut is_local: F,
) -> ReplayResult<ReplayPlan>
where
    F: FnMut(&str) -> ReplayResult<bool>,
{
    if is_local(target_sha)? {
        return Err(ReplayError::AlreadyPresent {
            sha: target_sha.to_string(),
        });
    }

    let mut chain: Vec<ReplayCommit> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = target_sha.to_string();

    loop {
        if chain.len() >= max_depth {
            return Err(ReplayError::DepthExceeded {
                sha: target_sha.to_string(),
                limit: max_depth,
            });
        }
        if !visited.insert(current.clone()) {
            return Err(ReplayError::CycleDetected { sha: current });
        }

        let details = source
            .commit(slug, &current)
            .await
            .map_err(|e| api_failure(&current, e))?;
        let parents = details.parent_shas();
        if parents.len() != 1 {
            return Err(ReplayError::NonLinearHistory {
                sha: current,
                parents: parents.len(),
            });
        }
        let patch = source
            .patch(slug, &current)
            .await
            .map_err(|e| api_failure(&current, e))?;

        chain.push(ReplayCommit {
            sha: current.clone(),
            patch,
            message: details.commit.message.clone(),
            author_name: details.author_name().to_string(),
            author_email: details.author_email().to_string(),
            author_date: details.author_date().map(str::to_string),
        });

        let parent = parents[0].clone();
        if is_local(&parent)? {
            chain.reverse();
            log::info!(
                "Found base commit {} for {}; {} commits to replay",
                parent,
                target_sha,
                chain.len()
            );
            return Ok(ReplayPlan {
                base_sha: parent,
                commits: chain,
            });
        }
        current = parent;
    }
}

fn api_failure(sha: &str, error: GithubError) -> ReplayError {
    if error.is_rate_limited() {
        ReplayError::CredentialsExhausted {
            sha: sha.to_string(),
            source: error,
        }
    } else {
        ReplayError::MissingCommit {
            sha: sha.to_string(),
            source: error,
        }
    }
}
