mod commands;
mod startup;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Workspace root plus a configuration file pointing at it
pub struct CliEnv {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl CliEnv {
    pub fn new(executable: &str) -> Self {
        Self::with_extra(executable, "")
    }

    /// `extra` is appended verbatim to the generated configuration
    pub fn with_extra(executable: &str, extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("commitscan.toml");
        let content = format!(
            r#"
[workspace]
root = "{root}"
lock_timeout_secs = 60

[scanner]
instance = "cli"
host = "http://127.0.0.1:9"
executable = "{executable}"

[jobs]
transient_retry_delay_secs = 0
workers = 1

[logging]
level = "warn"
{extra}
"#,
            root = dir.path().join("work").display(),
            executable = executable,
            extra = extra,
        );
        std::fs::write(&config, content).unwrap();
        Self { dir, config }
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn project_dir(&self, project_key: &str) -> PathBuf {
        self.workspace_root().join("cli").join(project_key)
    }

    pub fn run(&self, args: &[&str]) -> Output {
        run_with_config(Some(&self.config), args)
    }
}

pub fn run_with_config(config: Option<&Path>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_commitscan"));
    if let Some(config) = config {
        command.arg("--config-file").arg(config);
    }
    command
        .arg("--no-color")
        .args(args)
        .env_remove("GITHUB_TOKENS")
        .env_remove("SONAR_TOKEN")
        .env_remove("SONAR_SCANNER_HOME")
        .output()
        .expect("Failed to run commitscan")
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}\nstderr: {}",
            e,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}
