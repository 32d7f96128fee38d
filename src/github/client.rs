//! Rate-limit aware GitHub client
//!
//! Each request acquires a credential from the pool. Rate-limit responses cool
//! the credential down and the request moves on to the next one; auth
//! rejections retire the credential. The attempt budget is
//! `pool size * attempts_per_credential`.

use crate::github::error::{GithubError, GithubResult};
use crate::github::pool::CredentialPool;
use crate::github::transport::{HttpResponse, Transport};
use crate::github::types::CommitDetails;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const ACCEPT_JSON: &str = "application/vnd.github+json";
pub const ACCEPT_PATCH: &str = "application/vnd.github.v3.patch";
pub const DEFAULT_ATTEMPTS_PER_CREDENTIAL: usize = 2;
const SNIPPET_LEN: usize = 200;

pub struct GithubClient {
    base_url: String,
    pool: Arc<CredentialPool>,
    transport: Arc<dyn Transport>,
    attempts_per_credential: usize,
}

impl GithubClient {
    pub fn new(base_url: &str, pool: Arc<CredentialPool>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            pool,
            transport,
            attempts_per_credential: DEFAULT_ATTEMPTS_PER_CREDENTIAL,
        }
    }

    pub fn with_attempts_per_credential(mut self, attempts: usize) -> Self {
        self.attempts_per_credential = attempts.max(1);
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Commit metadata: sha, parents, message and author
    pub async fn get_commit(&self, slug: &str, sha: &str) -> GithubResult<CommitDetails> {
        let path = commit_path(slug, sha);
        let response = self.request(&path, ACCEPT_JSON).await?;
        serde_json::from_str(&response.body).map_err(|e| GithubError::Decode {
            path,
            message: e.to_string(),
        })
    }

    /// Commit as unified diff text (`git format-patch` layout)
    pub async fn get_commit_patch(&self, slug: &str, sha: &str) -> GithubResult<String> {
        let response = self.request(&commit_path(slug, sha), ACCEPT_PATCH).await?;
        Ok(response.body)
    }

    async fn request(&self, path: &str, accept: &str) -> GithubResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let max_attempts = self.pool.size().max(1) * self.attempts_per_credential;
        let mut transport_failures: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            let credential = self.pool.acquire()?;
            log::trace!(
                "GET {} with credential {} (attempt {}/{})",
                path,
                credential,
                attempt,
                max_attempts
            );

            let response = match self.transport.get(&url, accept, credential.expose()).await {
                Ok(response) => response,
                Err(error) => {
                    log::warn!("GitHub request {} failed with {}: {}", path, credential, error);
                    transport_failures.push(error.to_string());
                    continue;
                }
            };

            if response.status == 401 {
                log::warn!("GitHub rejected credential {} for {}", credential, path);
                self.pool.disable(&credential)?;
                continue;
            }

            if is_rate_limited(&response) {
                let hint = reset_hint(&response, self.pool.now());
                self.pool.mark_cooled_down(&credential, hint)?;
                continue;
            }

            if response.status >= 400 {
                if response.status < 500 && response.body.to_ascii_lowercase().contains("spammy") {
                    log::warn!("GitHub flagged credential {} as spammy", credential);
                    self.pool.disable(&credential)?;
                    continue;
                }
                return Err(GithubError::Api {
                    status: response.status,
                    path: path.to_string(),
                    snippet: snippet(&response.body),
                });
            }

            return Ok(response);
        }

        if let Some(last) = transport_failures.last() {
            return Err(GithubError::Transport {
                message: format!("{} attempts, last error: {}", transport_failures.len(), last),
            });
        }

        match self.pool.next_available_at() {
            Some(retry_at) => Err(GithubError::Exhausted { retry_at }),
            None => Err(GithubError::NoCredentials),
        }
    }
}

fn is_rate_limited(response: &HttpResponse) -> bool {
    response.status == 429
        || (response.status == 403
            && response
                .header("x-ratelimit-remaining")
                .map(str::trim)
                == Some("0"))
}

/// Cooldown deadline from `X-RateLimit-Reset` (epoch seconds) or `Retry-After` (seconds)
fn reset_hint(response: &HttpResponse, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(epoch) = response
        .header("x-ratelimit-reset")
        .and_then(|value| value.trim().parse::<i64>().ok())
    {
        return DateTime::from_timestamp(epoch, 0);
    }
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|seconds| now + Duration::seconds(seconds.max(0)))
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}

fn commit_path(slug: &str, sha: &str) -> String {
    format!("/repos/{}/commits/{}", encode_slug(slug), urlencoding::encode(sha))
}

/// Percent-encode an `owner/name` slug, keeping the separator
pub fn encode_slug(slug: &str) -> String {
    slug.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
