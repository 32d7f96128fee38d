//! Scanner Component
//!
//! Runs the external static-analysis scanner against a materialized commit.
//!
//! - **CommitRunner**: skip-if-published check, materialize, scan, archive, discard
//! - **ScannerCommand**: scanner process invocation with timeout and token masking
//! - **ScanTarget**: analysis server queries (component existence, measures)
//! - **LogArchive**: scan and error logs keyed by instance/project/commit

pub mod archive;
pub mod command;
pub mod error;
pub mod runner;
pub mod target;

pub use archive::{log_key, DirectoryArchive, LogArchive, LogKind};
pub use command::{resolve_executable, ScannerCommand, ScannerSettings};
pub use error::{ScannerError, ScannerResult};
pub use runner::{component_key, CommitRunner, CommitScanResult, CommitScanner, ScanRequest};
pub use target::{ScanTarget, SonarTarget, DEFAULT_METRICS};

#[cfg(test)]
mod tests;
