//! Async git CLI runner

use crate::git::error::{GitError, GitResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Captured result of a git invocation
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr);
        }
        combined
    }
}

/// One git invocation
///
/// ```rust,no_run
/// use commitscan::git::GitCommand;
///
/// # async fn example() -> commitscan::git::GitResult<()> {
/// let head = GitCommand::new(["rev-parse", "HEAD"])
///     .in_dir("/var/lib/commitscan/default/acme/repo")
///     .run()
///     .await?;
/// println!("{}", head.stdout.trim());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
}

impl GitCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            envs: Vec::new(),
            stdin: None,
        }
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn display(&self) -> String {
        format!("git {}", self.args.join(" "))
    }

    /// Run and fail with `CommandFailed` on a non-zero exit
    pub async fn run(self) -> GitResult<GitOutput> {
        let command = self.display();
        let output = self.run_allow_fail().await?;
        if output.success {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command,
                status: output.status.clone(),
                output: output.combined(),
            })
        }
    }

    /// Run and return the captured output whatever the exit status
    pub async fn run_allow_fail(self) -> GitResult<GitOutput> {
        let command_line = self.display();
        log::debug!("Running {}", command_line);

        let mut command = Command::new("git");
        command
            .args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let spawn_error = |source| GitError::Spawn {
            command: command_line.clone(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_error)?;
        if let Some(input) = &self.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input).await.map_err(spawn_error)?;
                pipe.shutdown().await.map_err(spawn_error)?;
            }
        }
        let output = child.wait_with_output().await.map_err(spawn_error)?;

        let result = GitOutput {
            success: output.status.success(),
            status: output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| format!("exit {}", code)),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            log::debug!("{} -> {}: {}", command_line, result.status, result.stderr.trim());
        }
        Ok(result)
    }
}
