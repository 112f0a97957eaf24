//! API keys issued to users for the proxied surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an API key's `model_access_list` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelAccessMode {
    /// Every model visible to the user is allowed.
    #[default]
    All,
    /// Only models in the list are allowed.
    Whitelist,
    /// Every model except those in the list is allowed.
    Blacklist,
}

impl ModelAccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAccessMode::All => "all",
            ModelAccessMode::Whitelist => "whitelist",
            ModelAccessMode::Blacklist => "blacklist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(ModelAccessMode::All),
            "whitelist" => Some(ModelAccessMode::Whitelist),
            "blacklist" => Some(ModelAccessMode::Blacklist),
            _ => None,
        }
    }
}

/// A stored API key. The plaintext secret exists only at creation time and in
/// the vault-encrypted `encrypted_key` column (for one-time reveal); lookups
/// go through the SHA-256 `key_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,

    /// First characters of the key for display ("gk_live_ab12...").
    pub key_prefix: String,

    #[serde(skip_serializing)]
    pub key_hash: String,

    #[serde(skip_serializing)]
    pub encrypted_key: String,

    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub model_access_mode: ModelAccessMode,
    pub model_access_list: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Key-level model filter. The per-user disabled-model set is applied
    /// separately; a model must pass both.
    pub fn is_model_allowed(&self, canonical_id: &str) -> bool {
        model_allowed(
            self.model_access_mode,
            &self.model_access_list,
            canonical_id,
        )
    }
}

/// The access-mode rule as a standalone function so session principals
/// (mode `all`, empty list) share the same code path.
pub fn model_allowed(mode: ModelAccessMode, list: &[String], canonical_id: &str) -> bool {
    match mode {
        ModelAccessMode::All => true,
        ModelAccessMode::Whitelist => list.iter().any(|m| m == canonical_id),
        ModelAccessMode::Blacklist => !list.iter().any(|m| m == canonical_id),
    }
}

/// Input for creating an API key. Hash and ciphertext are computed by the
/// caller (auth layer) so the repository never sees plaintext.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub encrypted_key: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub model_access_mode: ModelAccessMode,
    pub model_access_list: Vec<String>,
}
