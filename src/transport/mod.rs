//! Transports: one capability contract per upstream wire flavor.
//!
//! The dispatch engine hands a transport the decrypted account credential
//! and the caller's request; it gets back a status, a response body, and
//! token counts. Nothing above this layer knows provider payload shapes.

mod anthropic;
mod openai;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use anthropic::AnthropicTransport;
pub use openai::OpenAiTransport;

use crate::models::WireFlavor;

/// Decrypted credential material for one attempt. Built just before the
/// transport call and dropped right after.
pub struct AccountCredentials {
    pub api_key: String,
    pub base_url: String,
}

/// An upstream HTTP response, any status. Token counts are zero when the
/// provider reported none.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure: no upstream HTTP response arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("failed to reach upstream: {0}")]
    Request(reqwest::Error),

    #[error("upstream response could not be read: {0}")]
    Body(String),
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// One attempt against one account. The per-attempt timeout lives in the
    /// `reqwest::Client`, not here.
    async fn send(
        &self,
        client: &reqwest::Client,
        credentials: &AccountCredentials,
        model: &str,
        request: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

/// Wire-flavor to transport mapping, built once at startup.
#[derive(Clone)]
pub struct TransportRegistry {
    openai: Arc<dyn Transport>,
    anthropic: Arc<dyn Transport>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            openai: Arc::new(OpenAiTransport),
            anthropic: Arc::new(AnthropicTransport),
        }
    }

    /// Route every flavor through one transport. Used by tests to script
    /// outcomes without touching the network.
    pub fn uniform(transport: Arc<dyn Transport>) -> Self {
        Self {
            openai: transport.clone(),
            anthropic: transport,
        }
    }

    pub fn for_flavor(&self, flavor: WireFlavor) -> &Arc<dyn Transport> {
        match flavor {
            WireFlavor::OpenAi => &self.openai,
            WireFlavor::Anthropic => &self.anthropic,
        }
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
