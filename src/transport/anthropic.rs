//! Transport for the Anthropic Messages API.
//!
//! Translates between the OpenAI-shaped surface the proxy exposes and
//! Anthropic's wire format, in both directions. Translation is deliberately
//! narrow: chat messages, system prompt, max_tokens, temperature. Anything
//! the Messages API cannot express is dropped.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{AccountCredentials, Transport, TransportError, TransportResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when the caller omits max_tokens, which Anthropic requires.
const DEFAULT_MAX_TOKENS: i64 = 4096;

pub struct AnthropicTransport;

#[async_trait]
impl Transport for AnthropicTransport {
    async fn send(
        &self,
        client: &reqwest::Client,
        credentials: &AccountCredentials,
        model: &str,
        request: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let url = format!("{}/v1/messages", credentials.base_url.trim_end_matches('/'));
        let body = to_anthropic_request(model, request);

        let response = client
            .post(&url)
            .header("x-api-key", &credentials.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        if !(200..300).contains(&status) {
            // Error bodies are only logged upstream of here; no translation
            return Ok(TransportResponse {
                status,
                body: bytes,
                input_tokens: 0,
                output_tokens: 0,
            });
        }

        let upstream: Value = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Body(format!("invalid upstream JSON: {e}")))?;
        let (input_tokens, output_tokens) = extract_usage(&upstream);
        let translated = to_openai_response(model, &upstream);

        Ok(TransportResponse {
            status,
            body: serde_json::to_vec(&translated)
                .map_err(|e| TransportError::Body(e.to_string()))?
                .into(),
            input_tokens,
            output_tokens,
        })
    }
}

fn to_anthropic_request(model: &str, request: &Value) -> Value {
    let empty = Vec::new();
    let messages = request["messages"].as_array().unwrap_or(&empty);

    // Anthropic takes the system prompt as a top-level field
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m["role"] == "system")
        .filter_map(|m| m["content"].as_str())
        .collect();
    let chat: Vec<Value> = messages
        .iter()
        .filter(|m| m["role"] != "system")
        .cloned()
        .collect();

    let mut body = json!({
        "model": model,
        "messages": chat,
        "max_tokens": request["max_tokens"].as_i64().unwrap_or(DEFAULT_MAX_TOKENS),
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.join("\n\n"));
    }
    if let Some(temperature) = request["temperature"].as_f64() {
        body["temperature"] = json!(temperature);
    }
    body
}

fn to_openai_response(model: &str, upstream: &Value) -> Value {
    let text: String = upstream["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let finish_reason = match upstream["stop_reason"].as_str() {
        Some("max_tokens") => "length",
        Some("tool_use") => "tool_calls",
        _ => "stop",
    };
    let (input_tokens, output_tokens) = extract_usage(upstream);

    json!({
        "id": upstream["id"],
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": finish_reason,
        }],
        "usage": {
            "prompt_tokens": input_tokens,
            "completion_tokens": output_tokens,
            "total_tokens": input_tokens + output_tokens,
        },
    })
}

fn extract_usage(upstream: &Value) -> (i64, i64) {
    (
        upstream["usage"]["input_tokens"].as_i64().unwrap_or(0),
        upstream["usage"]["output_tokens"].as_i64().unwrap_or(0),
    )
}
