//! Git fixtures for unit tests, built with the real git CLI

use std::path::Path;
use std::process::Command;

/// Run git in `dir` and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialise a repository with a fixed identity on branch `main`
pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).expect("Failed to create repo dir");
    git(dir, &["init", "-q"]);
    git(dir, &["checkout", "-q", "-b", "main"]);
    git(dir, &["config", "user.name", "Fixture Author"]);
    git(dir, &["config", "user.email", "fixture@example.org"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Write `content` to `file`, commit it and return the new HEAD sha
pub fn commit_file(dir: &Path, file: &str, content: &str, message: &str) -> String {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    git(dir, &["add", "--", file]);
    git(dir, &["commit", "-q", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// `git format-patch` output for a single commit, as the API patch endpoint returns it
pub fn patch_for(dir: &Path, sha: &str) -> String {
    let output = Command::new("git")
        .args(["format-patch", "-1", "--stdout", sha])
        .current_dir(dir)
        .output()
        .expect("Failed to run git format-patch");
    assert!(output.status.success());
    String::from_utf8(output.stdout).expect("patch is not utf-8")
}
