//! CLI module containing argument parsing and configuration loading

pub mod args;
pub mod config;

pub use args::{
    Args, Command, CommitRef, MaterializeArgs, MeasuresArgs, ReplayPlanArgs, RepoSource, ScanArgs,
};
pub use config::{ConfigError, ConfigResult, PipelineConfig};

#[cfg(test)]
mod tests;
