//! GitHub commit-source access
//!
//! - **CredentialPool**: round-robin token rotation with cooldown deadlines
//! - **GithubClient**: commit metadata and patch requests that rotate
//!   credentials on rate-limit responses
//! - **Transport**: HTTP seam, reqwest in production and scripted in tests

pub mod client;
pub mod error;
pub mod pool;
pub mod transport;
pub mod types;

pub use client::{GithubClient, ACCEPT_JSON, ACCEPT_PATCH, DEFAULT_API_URL};
pub use error::{GithubError, GithubResult};
pub use pool::{Credential, CredentialPool};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
pub use types::CommitDetails;

#[cfg(test)]
mod tests;
