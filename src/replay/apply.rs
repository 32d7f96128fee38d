//! Applying a replay plan inside an isolated working copy

use crate::git::GitCommand;
use crate::replay::error::{ReplayError, ReplayResult};
use crate::replay::plan::{ReplayCommit, ReplayPlan};
use std::path::Path;

pub const REPLAY_COMMITTER_NAME: &str = "Commitscan Replay";
pub const REPLAY_COMMITTER_EMAIL: &str = "replay@commitscan.local";

/// Detach `worktree` at the plan's base and re-create each commit in order
///
/// Returns the effective SHA: the hash of the last synthetic commit. Author
/// identity and date are preserved; the committer is fixed and its date
/// mirrors the author date, so replaying the same plan twice yields the same
/// hash.
pub async fn apply_replay_plan(worktree: &Path, plan: &ReplayPlan) -> ReplayResult<String> {
    GitCommand::new(["checkout", "-q", "--detach", plan.base_sha.as_str()])
        .in_dir(worktree)
        .run()
        .await?;

    let mut head = plan.base_sha.clone();
    for commit in &plan.commits {
        log::debug!("Replaying {} onto {}", commit.sha, head);
        apply_patch(worktree, commit).await?;
        head = commit_index(worktree, commit).await?;
    }

    log::info!(
        "Replay complete: {} -> synthetic {}",
        plan.target_sha(),
        head
    );
    Ok(head)
}

async fn apply_patch(worktree: &Path, commit: &ReplayCommit) -> ReplayResult<()> {
    // Empty commits come back as a bare mail header with no diff
    if !commit.patch.contains("diff --git") {
        return Ok(());
    }

    let output = GitCommand::new(["apply", "--index", "--whitespace=nowarn", "-"])
        .in_dir(worktree)
        .stdin(commit.patch.as_bytes())
        .run_allow_fail()
        .await?;
    if !output.success {
        return Err(ReplayError::ApplyFailed {
            sha: commit.sha.clone(),
            output: output.combined(),
        });
    }
    Ok(())
}

async fn commit_index(worktree: &Path, commit: &ReplayCommit) -> ReplayResult<String> {
    let unchanged = GitCommand::new(["diff", "--cached", "--quiet"])
        .in_dir(worktree)
        .run_allow_fail()
        .await?
        .success;

    let message = if commit.message.trim().is_empty() {
        format!("Replay of {}", commit.sha)
    } else {
        commit.message.clone()
    };

    let mut args = vec!["-c", "gc.auto=0", "commit", "-q", "--no-verify", "-m", message.as_str()];
    if unchanged {
        args.push("--allow-empty");
    }

    let mut command = GitCommand::new(args)
        .in_dir(worktree)
        .env("GIT_AUTHOR_NAME", commit.author_name.as_str())
        .env("GIT_AUTHOR_EMAIL", commit.author_email.as_str())
        .env("GIT_COMMITTER_NAME", REPLAY_COMMITTER_NAME)
        .env("GIT_COMMITTER_EMAIL", REPLAY_COMMITTER_EMAIL);
    if let Some(date) = commit.author_date.as_deref().filter(|d| !d.is_empty()) {
        command = command
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date);
    }
    command.run().await?;

    let head = GitCommand::new(["rev-parse", "HEAD"])
        .in_dir(worktree)
        .run()
        .await?;
    Ok(head.stdout.trim().to_string())
}
