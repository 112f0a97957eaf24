//! Transport for OpenAI-compatible providers.

use async_trait::async_trait;

use super::{AccountCredentials, Transport, TransportError, TransportResponse};

pub struct OpenAiTransport;

#[async_trait]
impl Transport for OpenAiTransport {
    async fn send(
        &self,
        client: &reqwest::Client,
        credentials: &AccountCredentials,
        model: &str,
        request: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let url = format!(
            "{}/chat/completions",
            credentials.base_url.trim_end_matches('/')
        );

        // Forward the caller's body as-is with the canonical model substituted
        let mut body = request.clone();
        body["model"] = serde_json::Value::String(model.to_string());

        let response = client
            .post(&url)
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        let (input_tokens, output_tokens) = extract_usage(&bytes);
        Ok(TransportResponse {
            status,
            body: bytes,
            input_tokens,
            output_tokens,
        })
    }
}

/// Token counts from an OpenAI-shaped `usage` object. Some compatible
/// providers use the newer `input_tokens`/`output_tokens` names.
fn extract_usage(body: &[u8]) -> (i64, i64) {
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) else {
        return (0, 0);
    };
    let usage = &json["usage"];
    let input = usage["prompt_tokens"]
        .as_i64()
        .or_else(|| usage["input_tokens"].as_i64())
        .unwrap_or(0);
    let output = usage["completion_tokens"]
        .as_i64()
        .or_else(|| usage["output_tokens"].as_i64())
        .unwrap_or(0);
    (input, output)
}
