//! HTTP seam under the GitHub client

use crate::github::error::{GithubError, GithubResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Minimal response view the client needs: status, headers, body text
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|value| value.as_str())
    }
}

/// Issues authenticated GET requests
///
/// Implementations return `GithubError::Transport` only for failures where no
/// HTTP response was received; every received response is returned as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, accept: &str, token: &str) -> GithubResult<HttpResponse>;
}

/// Production transport backed by reqwest with rustls
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> GithubResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("commitscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GithubError::Transport {
                message: format!("could not build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, accept: &str, token: &str) -> GithubResult<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", token))
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| GithubError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| GithubError::Transport {
            message: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
