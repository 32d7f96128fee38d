//! Command-line arguments
//!
//! Global options may appear before or after the subcommand. Values given
//! here override the configuration file.

use crate::core::version::long_version;
use clap::{ArgAction, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "commitscan")]
#[command(about = "Replay CI build commits into isolated worktrees and scan them")]
#[command(version, long_version = long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", global = true,
          value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", global = true,
          value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Force colored output
    #[arg(long = "color", action = ArgAction::SetTrue, global = true, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a job for one commit and run it to completion
    Scan(ScanArgs),
    /// Produce a worktree for a commit and leave it in place
    Materialize(MaterializeArgs),
    /// Remove the worktree for a commit
    Discard(CommitRef),
    /// Show how a missing commit would be replayed, without applying it
    ReplayPlan(ReplayPlanArgs),
    /// Fetch analysis measures for a scanned commit
    Measures(MeasuresArgs),
}

/// Project and commit addressed by a command
#[derive(clap::Args, Debug, Clone)]
pub struct CommitRef {
    /// Project key (also the workspace directory name)
    #[arg(short = 'k', long = "project-key", value_name = "KEY")]
    pub project_key: String,

    /// Commit SHA
    #[arg(short = 's', long = "commit", value_name = "SHA")]
    pub commit: String,
}

/// Where the project's repository lives; at least one is required
#[derive(clap::Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub struct RepoSource {
    /// Repository clone URL or local path
    #[arg(short = 'r', long = "repo", value_name = "URL")]
    pub repo: Option<String>,

    /// Fork slug (OWNER/NAME) used for fork fetches and replay
    #[arg(long = "slug", value_name = "OWNER/NAME")]
    pub slug: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub commit: CommitRef,

    #[command(flatten)]
    pub source: RepoSource,

    /// Attempt limit for transient failures (configuration default when omitted)
    #[arg(long = "max-retries", value_name = "COUNT",
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: Option<u32>,

    /// File with scanner properties overriding the project configuration
    #[arg(long = "config-override", value_name = "FILE")]
    pub config_override: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MaterializeArgs {
    #[command(flatten)]
    pub commit: CommitRef,

    #[command(flatten)]
    pub source: RepoSource,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReplayPlanArgs {
    #[command(flatten)]
    pub commit: CommitRef,

    /// Fork slug (OWNER/NAME) the commits are fetched from
    #[arg(long = "slug", value_name = "OWNER/NAME")]
    pub slug: String,

    /// Clone or refresh the mirror from this URL before planning
    #[arg(short = 'r', long = "repo", value_name = "URL")]
    pub repo: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MeasuresArgs {
    #[command(flatten)]
    pub commit: CommitRef,

    /// Metric keys to fetch* (default set when omitted)
    #[arg(short = 'm', long = "metric", value_name = "KEYS", value_delimiter = ',',
          action = ArgAction::Append)]
    pub metrics: Vec<String>,
}

impl Args {
    /// Colour decision: explicit flags win, otherwise stdout must be a terminal
    /// and `NO_COLOR` unset
    pub fn use_color(&self) -> bool {
        if self.no_color {
            return false;
        }
        if self.color {
            return true;
        }
        std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    }

    /// Subcommand name as typed on the command line
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::Scan(_) => "scan",
            Command::Materialize(_) => "materialize",
            Command::Discard(_) => "discard",
            Command::ReplayPlan(_) => "replay-plan",
            Command::Measures(_) => "measures",
        }
    }
}
