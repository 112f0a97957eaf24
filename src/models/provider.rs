//! Provider kinds and their capability table.
//!
//! Every supported upstream provider is a variant of [`ProviderKind`]. All
//! per-provider facts (wire flavor, default base URL, display name) live in
//! exhaustive matches on this enum so adding a provider is a compile-error
//! checklist rather than a scavenger hunt through string-keyed maps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of upstream providers a user can link accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
    Groq,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Qwen,
    Kimi,
    Zhipu,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

/// How a provider's HTTP API is shaped. The dispatch engine only picks a
/// transport by flavor; it never inspects provider payloads itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFlavor {
    /// OpenAI-compatible `POST {base}/chat/completions` with a Bearer key.
    OpenAi,
    /// Anthropic `POST {base}/v1/messages` with an `x-api-key` header.
    Anthropic,
}

#[derive(Debug, Error)]
#[error("unknown provider kind: {0}")]
pub struct UnknownProviderKind(pub String);

impl ProviderKind {
    pub const ALL: [ProviderKind; 10] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Mistral,
        ProviderKind::Groq,
        ProviderKind::DeepSeek,
        ProviderKind::Qwen,
        ProviderKind::Kimi,
        ProviderKind::Zhipu,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Groq => "groq",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Qwen => "qwen",
            ProviderKind::Kimi => "kimi",
            ProviderKind::Zhipu => "zhipu",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Gemini => "Google Gemini",
            ProviderKind::Mistral => "Mistral AI",
            ProviderKind::Groq => "Groq",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Qwen => "Qwen",
            ProviderKind::Kimi => "Moonshot Kimi",
            ProviderKind::Zhipu => "Zhipu AI",
            ProviderKind::OpenRouter => "OpenRouter",
        }
    }

    /// The wire flavor the transport layer uses for this provider.
    ///
    /// Everything except Anthropic speaks an OpenAI-compatible dialect
    /// (Gemini via its OpenAI-compatibility endpoint).
    pub fn wire_flavor(&self) -> WireFlavor {
        match self {
            ProviderKind::Anthropic => WireFlavor::Anthropic,
            ProviderKind::OpenAi
            | ProviderKind::Gemini
            | ProviderKind::Mistral
            | ProviderKind::Groq
            | ProviderKind::DeepSeek
            | ProviderKind::Qwen
            | ProviderKind::Kimi
            | ProviderKind::Zhipu
            | ProviderKind::OpenRouter => WireFlavor::OpenAi,
        }
    }

    /// Default API base URL, used when an account does not override it.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            ProviderKind::Mistral => "https://api.mistral.ai/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
            ProviderKind::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ProviderKind::Kimi => "https://api.moonshot.ai/v1",
            ProviderKind::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProviderKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownProviderKind(s.to_string()))
    }
}
