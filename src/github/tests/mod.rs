//! Client behaviour against a scripted transport


use crate::github::error::{GithubError, GithubResult};
use crate::github::transport::{HttpResponse, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every call
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<GithubResult<HttpResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub accept: String,
    pub token: String,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<GithubResult<HttpResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.token).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, accept: &str, token: &str) -> GithubResult<HttpResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            accept: accept.to_string(),
            token: token.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(GithubError::Transport {
                    message: "script exhausted".to_string(),
                })
            })
    }
}
