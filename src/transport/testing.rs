//! A scripted transport for tests and local smoke runs.
//!
//! Outcomes are consumed in order; once the script is exhausted every call
//! succeeds with a canned completion. Calls are recorded so tests can assert
//! how many attempts were made and with which credentials.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{AccountCredentials, Transport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Respond with this status and a minimal body.
    Status(u16),
    /// Respond with this status and an explicit body.
    StatusBody(u16, serde_json::Value),
    /// Simulate a per-attempt timeout.
    Timeout,
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// API keys seen so far, one per attempt, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn canned_completion(model: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-scripted",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "scripted response"},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21},
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _client: &reqwest::Client,
        credentials: &AccountCredentials,
        model: &str,
        _request: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(credentials.api_key.clone());

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(ScriptedOutcome::Status(200));

        let (status, body) = match outcome {
            ScriptedOutcome::Timeout => return Err(TransportError::Timeout),
            ScriptedOutcome::Status(status) if (200..300).contains(&status) => {
                (status, Self::canned_completion(model))
            }
            ScriptedOutcome::Status(status) => (
                status,
                json!({"error": {"message": "scripted failure", "type": "upstream"}}),
            ),
            ScriptedOutcome::StatusBody(status, body) => (status, body),
        };

        let bytes: bytes::Bytes = serde_json::to_vec(&body)
            .map_err(|e| TransportError::Body(e.to_string()))?
            .into();
        let (input_tokens, output_tokens) = if (200..300).contains(&status) {
            (
                body["usage"]["prompt_tokens"].as_i64().unwrap_or(0),
                body["usage"]["completion_tokens"].as_i64().unwrap_or(0),
            )
        } else {
            (0, 0)
        };

        Ok(TransportResponse {
            status,
            body: bytes,
            input_tokens,
            output_tokens,
        })
    }
}
