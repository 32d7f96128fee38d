//! Analysis server queries: component existence and measures

use crate::core::retry::{retry_async_when, RetryPolicy};
use crate::scanner::error::{ScannerError, ScannerResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Statuses worth another attempt
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
pub const MEASURE_CHUNK_SIZE: usize = 25;

pub const DEFAULT_METRICS: &[&str] = &[
    "ncloc",
    "complexity",
    "cognitive_complexity",
    "duplicated_lines_density",
    "violations",
    "bugs",
    "vulnerabilities",
    "code_smells",
    "sqale_index",
    "reliability_rating",
    "security_rating",
    "sqale_rating",
];

/// Where scan results are published
#[async_trait]
pub trait ScanTarget: Send + Sync {
    /// Whether `component_key` already has recorded results
    ///
    /// Lookup failures answer `false`; scanning again is the safe outcome.
    async fn component_exists(&self, component_key: &str) -> bool;
}

/// SonarQube web API client
pub struct SonarTarget {
    client: reqwest::Client,
    host: String,
    token: String,
    retry: RetryPolicy,
}

impl SonarTarget {
    pub fn new(host: &str, token: &str, timeout: Duration) -> ScannerResult<Self> {
        let host = host.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScannerError::Target {
                url: host.clone(),
                status: None,
                message: format!("could not build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            host,
            token: token.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Metric values for a component, requested in fixed-size chunks
    pub async fn fetch_measures(
        &self,
        component_key: &str,
        metrics: &[String],
    ) -> ScannerResult<BTreeMap<String, String>> {
        let mut measures = BTreeMap::new();
        for chunk in metrics.chunks(MEASURE_CHUNK_SIZE) {
            let query = [
                ("component", component_key.to_string()),
                ("metricKeys", chunk.join(",")),
            ];
            let body = self.get_json("/api/measures/component", &query).await?;
            collect_measures(&body, &mut measures);
        }
        Ok(measures)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ScannerResult<Value> {
        let url = format!("{}{}", self.host, path);
        retry_async_when(
            path,
            self.retry.clone(),
            is_retryable,
            || self.get_json_once(&url, query),
        )
        .await
    }

    async fn get_json_once(&self, url: &str, query: &[(&str, String)]) -> ScannerResult<Value> {
        let failure = |status: Option<u16>, message: String| ScannerError::Target {
            url: url.to_string(),
            status,
            message,
        };
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth(&self.token, Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| failure(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(failure(Some(status.as_u16()), snippet));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| failure(Some(status.as_u16()), format!("invalid JSON: {}", e)))
    }
}

#[async_trait]
impl ScanTarget for SonarTarget {
    async fn component_exists(&self, component_key: &str) -> bool {
        let query = [("projects", component_key.to_string())];
        match self.get_json("/api/projects/search", &query).await {
            Ok(body) => components_contain(&body, component_key),
            Err(e) => {
                log::warn!("Could not check whether {} exists: {}", component_key, e);
                false
            }
        }
    }
}

fn is_retryable(error: &ScannerError) -> bool {
    match error {
        ScannerError::Target { status: None, .. } => true,
        ScannerError::Target {
            status: Some(status),
            ..
        } => RETRYABLE_STATUSES.contains(status),
        _ => false,
    }
}

fn components_contain(body: &Value, component_key: &str) -> bool {
    body.get("components")
        .and_then(Value::as_array)
        .map(|components| {
            components
                .iter()
                .any(|component| component.get("key").and_then(Value::as_str) == Some(component_key))
        })
        .unwrap_or(false)
}

fn collect_measures(body: &Value, into: &mut BTreeMap<String, String>) {
    let Some(measures) = body
        .pointer("/component/measures")
        .and_then(Value::as_array)
    else {
        return;
    };
    for measure in measures {
        let metric = measure.get("metric").and_then(Value::as_str);
        let value = measure.get("value").and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        if let (Some(metric), Some(value)) = (metric, value) {
            into.insert(metric.to_string(), value);
        }
    }
}
