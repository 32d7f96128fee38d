use super::{run_with_config, CliEnv};

const DISCARD: [&str; 5] = ["discard", "-k", "acme_widgets", "-s", "4f2a9c1e"];

#[test]
fn test_version_mentions_binary_name() {
    let output = run_with_config(None, &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("commitscan"));
}

#[test]
fn test_missing_subcommand_is_a_usage_error() {
    let output = run_with_config(None, &["--log-level", "info"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_config_file_exits_with_config_status() {
    let dir = tempfile::TempDir::new().unwrap();
    let absent = dir.path().join("absent.toml");
    let output = run_with_config(Some(&absent), &DISCARD);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_unknown_config_key_exits_with_config_status() {
    let env = CliEnv::with_extra("true", "[github]\ntokenz = []\n");
    let output = env.run(&DISCARD);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_config_value_exits_with_config_status() {
    let env = CliEnv::with_extra("true", "format = \"xml\"\n");
    let output = env.run(&DISCARD);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_discard_of_unknown_worktree_succeeds() {
    let env = CliEnv::new("true");
    let output = env.run(&DISCARD);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(env.project_dir("acme_widgets").join("worktrees").is_dir());
}
