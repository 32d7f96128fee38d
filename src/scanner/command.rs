//! External scanner process invocation

use crate::scanner::error::{ScannerError, ScannerResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

pub const DEFAULT_SCANNER_EXECUTABLE: &str = "sonar-scanner";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(3600);
const TOKEN_PROPERTY: &str = "-Dsonar.token=";

/// How to reach the scanner and the analysis server
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub executable: PathBuf,
    pub host_url: String,
    pub token: String,
    pub timeout: Duration,
    /// Additional `key=value` properties passed as `-D` arguments
    pub extra_properties: Vec<String>,
}

impl ScannerSettings {
    pub fn new(host_url: &str, token: &str) -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_SCANNER_EXECUTABLE),
            host_url: host_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: DEFAULT_SCAN_TIMEOUT,
            extra_properties: Vec::new(),
        }
    }
}

/// Scanner binary: `<home>/bin/sonar-scanner` when a scanner home is set,
/// else the configured executable, else `sonar-scanner` from `PATH`
pub fn resolve_executable(configured: Option<&str>, scanner_home: Option<&str>) -> PathBuf {
    if let Some(home) = scanner_home.map(str::trim).filter(|home| !home.is_empty()) {
        return Path::new(home).join("bin").join(DEFAULT_SCANNER_EXECUTABLE);
    }
    configured
        .map(str::trim)
        .filter(|exe| !exe.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCANNER_EXECUTABLE))
}

#[derive(Debug, Clone)]
pub struct ScannerCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ScannerCommand {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Scan of `worktree` published under `component_key`
    pub fn for_component(
        settings: &ScannerSettings,
        component_key: &str,
        worktree: &Path,
        override_config: Option<&Path>,
    ) -> Self {
        let mut args = vec![
            format!("-Dsonar.projectKey={}", component_key),
            format!("-Dsonar.projectName={}", component_key),
            "-Dsonar.sources=.".to_string(),
            format!("-Dsonar.host.url={}", settings.host_url),
        ];
        if !settings.token.is_empty() {
            args.push(format!("{}{}", TOKEN_PROPERTY, settings.token));
        }
        args.extend([
            "-Dsonar.sourceEncoding=UTF-8".to_string(),
            "-Dsonar.scm.exclusions.disabled=true".to_string(),
            "-Dsonar.java.binaries=.".to_string(),
        ]);
        if let Some(path) = override_config {
            args.push(format!("-Dproject.settings={}", path.display()));
        }
        for property in settings.extra_properties.iter().map(|p| p.trim()) {
            if property.is_empty() {
                continue;
            }
            if property.starts_with("-D") {
                args.push(property.to_string());
            } else {
                args.push(format!("-D{}", property));
            }
        }
        Self::new(&settings.executable, args, worktree, settings.timeout)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command line safe for logs
    pub fn display_masked(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|arg| {
            if arg.starts_with(TOKEN_PROPERTY) {
                format!("{}****", TOKEN_PROPERTY)
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }

    /// Run to completion; returns combined stdout and stderr
    pub async fn run(&self) -> ScannerResult<String> {
        log::info!(
            "Running scanner in {}: {}",
            self.working_dir.display(),
            self.display_masked()
        );
        let launch_error = |source| ScannerError::Launch {
            program: self.program.display().to_string(),
            source,
        };

        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_error)?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(launch_error)?,
            Err(_) => {
                log::warn!("Scanner exceeded {:?}; killed", self.timeout);
                return Err(ScannerError::TimedOut {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ScannerError::Failed {
                status: output.status.to_string(),
                output: combined,
            })
        }
    }
}
