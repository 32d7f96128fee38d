use super::{Setup, PROJECT};
use crate::common::{git, FORK_SLUG};
use commitscan::replay::{ReplayError, REPLAY_COMMITTER_EMAIL, REPLAY_COMMITTER_NAME};
use commitscan::workspace::WorkspaceError;

#[tokio::test]
async fn test_upstream_commit_needs_no_replay() {
    let setup = Setup::new();
    let base = setup.repo.base.clone();

    let materialized = setup
        .workspace
        .materialize(PROJECT, &base, Some(&setup.repo.origin_url()), Some(FORK_SLUG))
        .await
        .unwrap();

    assert!(!materialized.replayed);
    assert_eq!(materialized.effective_sha, base);
    assert_eq!(setup.source.request_count(), 0);
    assert_eq!(
        std::fs::read_to_string(materialized.path.join("lib/core.txt")).unwrap(),
        "core v1\n"
    );
}

#[tokio::test]
async fn test_fork_commit_is_rebuilt_from_the_commit_source() {
    let setup = Setup::new();
    let tip = setup.repo.tip().to_string();

    let materialized = setup
        .workspace
        .materialize(PROJECT, &tip, Some(&setup.repo.origin_url()), Some(FORK_SLUG))
        .await
        .unwrap();

    assert!(materialized.replayed);
    assert_eq!(materialized.requested_sha, tip);
    assert_ne!(materialized.effective_sha, tip);
    assert!(setup.source.request_count() >= 2);

    let worktree = &materialized.path;
    assert_eq!(git(worktree, &["rev-parse", "HEAD"]), materialized.effective_sha);
    assert_eq!(
        git(worktree, &["rev-parse", "HEAD^{tree}"]),
        setup.repo.tree_of(&tip)
    );
    assert_eq!(git(worktree, &["log", "-1", "--format=%an <%ae>"]), "Fork Author <fork@example.org>");
    assert_eq!(
        git(worktree, &["log", "-1", "--format=%cn <%ce>"]),
        format!("{} <{}>", REPLAY_COMMITTER_NAME, REPLAY_COMMITTER_EMAIL)
    );
    assert_eq!(
        std::fs::read_to_string(worktree.join("lib/extra.txt")).unwrap(),
        "extra\n"
    );
}

#[tokio::test]
async fn test_replay_is_reproducible_across_attempts() {
    let setup = Setup::new();
    let tip = setup.repo.tip().to_string();
    let origin = setup.repo.origin_url();

    let first = setup
        .workspace
        .materialize(PROJECT, &tip, Some(&origin), Some(FORK_SLUG))
        .await
        .unwrap();
    setup.workspace.discard(PROJECT, &tip).await.unwrap();
    assert!(!first.path.exists());

    let second = setup
        .workspace
        .materialize(PROJECT, &tip, Some(&origin), Some(FORK_SLUG))
        .await
        .unwrap();
    assert_eq!(first.effective_sha, second.effective_sha);
    assert_eq!(second.path, setup.worktree(&tip));
}

#[tokio::test]
async fn test_plan_lists_fork_commits_oldest_first() {
    let setup = Setup::new();
    setup
        .workspace
        .ensure_mirror(PROJECT, &setup.repo.origin_url())
        .await
        .unwrap();

    let plan = setup
        .workspace
        .plan_replay(PROJECT, setup.repo.tip(), FORK_SLUG)
        .await
        .unwrap();

    assert_eq!(plan.base_sha, setup.repo.base);
    let shas: Vec<&str> = plan.commits.iter().map(|commit| commit.sha.as_str()).collect();
    assert_eq!(shas, vec![setup.repo.fork_commits[0].as_str(), setup.repo.tip()]);
    assert_eq!(plan.commits[0].author_name, "Fork Author");
    assert_eq!(plan.target_sha(), setup.repo.tip());
}

#[tokio::test]
async fn test_plan_without_mirror_is_refused() {
    let setup = Setup::new();
    let error = setup
        .workspace
        .plan_replay(PROJECT, setup.repo.tip(), FORK_SLUG)
        .await
        .unwrap_err();
    assert!(matches!(error, WorkspaceError::CommitUnavailable { .. }));
}

#[tokio::test]
async fn test_commit_unknown_everywhere_is_missing() {
    let setup = Setup::new();
    let unknown = "0123456789abcdef0123456789abcdef01234567";

    let error = setup
        .workspace
        .materialize(PROJECT, unknown, Some(&setup.repo.origin_url()), Some(FORK_SLUG))
        .await
        .unwrap_err();

    assert!(
        matches!(error, WorkspaceError::Replay(ReplayError::MissingCommit { .. })),
        "unexpected error: {}",
        error
    );
}
