use super::{stdout_json, CliEnv};
use crate::common::{ForkedRepo, FORK_SLUG};
use std::path::PathBuf;

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "exit {:?}, stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_materialize_then_discard_upstream_commit() {
    let repo = ForkedRepo::new();
    let env = CliEnv::new("true");
    let origin = repo.origin_url();

    let output = env.run(&[
        "materialize", "-k", "acme_widgets", "-s", &repo.base, "--repo", &origin,
    ]);
    assert_success(&output);
    let json = stdout_json(&output);
    assert_eq!(json["effective_sha"], repo.base.as_str());
    assert_eq!(json["replayed"], false);
    let worktree = PathBuf::from(json["path"].as_str().unwrap());
    assert!(worktree.join("lib/core.txt").exists());
    assert!(worktree.starts_with(env.project_dir("acme_widgets")));

    let output = env.run(&["discard", "-k", "acme_widgets", "-s", &repo.base]);
    assert_success(&output);
    assert!(!worktree.exists());
}

#[test]
fn test_fork_commit_without_credentials_is_a_runtime_failure() {
    let repo = ForkedRepo::new();
    let env = CliEnv::with_extra(
        "true",
        &format!("\n[github]\nfork_base_url = \"{}\"\n", repo.empty_fork_host()),
    );

    let output = env.run(&[
        "materialize",
        "-k",
        "acme_widgets",
        "-s",
        repo.tip(),
        "--repo",
        &repo.origin_url(),
        "--slug",
        FORK_SLUG,
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_scan_reports_successful_job() {
    let repo = ForkedRepo::new();
    let env = CliEnv::new("true");

    let output = env.run(&[
        "scan", "-k", "acme_widgets", "-s", &repo.base, "--repo", &repo.origin_url(),
    ]);
    assert_success(&output);

    let job = stdout_json(&output);
    assert_eq!(job["status"], "success");
    assert_eq!(job["effective_sha"], repo.base.as_str());
    assert_eq!(job["instance_name"], "cli");
    assert_eq!(job["retry_count"], 0);
}

#[test]
fn test_scan_with_failing_scanner_exits_with_failure() {
    let repo = ForkedRepo::new();
    let env = CliEnv::new("false");

    let output = env.run(&[
        "scan",
        "-k",
        "acme_widgets",
        "-s",
        &repo.base,
        "--repo",
        &repo.origin_url(),
        "--max-retries",
        "1",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let job = stdout_json(&output);
    assert_eq!(job["status"], "failed_permanent");
    assert!(job["last_error"].as_str().unwrap().contains("Scanner"));
}

#[test]
fn test_scan_override_file_must_exist() {
    let repo = ForkedRepo::new();
    let env = CliEnv::new("true");
    let absent = env.dir.path().join("absent.properties");

    let output = env.run(&[
        "scan",
        "-k",
        "acme_widgets",
        "-s",
        &repo.base,
        "--repo",
        &repo.origin_url(),
        "--config-override",
        absent.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_replay_plan_requires_a_mirror_or_repository() {
    let repo = ForkedRepo::new();
    let env = CliEnv::new("true");

    let output = env.run(&["replay-plan", "-k", "acme_widgets", "-s", repo.tip(), "--slug", FORK_SLUG]);
    assert_eq!(output.status.code(), Some(1));
}
