//! Provider accounts: one user's credentialed link to an upstream provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::ProviderKind;

/// A credentialed link between a user and an upstream provider.
///
/// Health timestamps are written by the dispatch engine after each attempt;
/// everything else changes only through explicit user action. An inactive
/// account is never selected for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: ProviderKind,

    /// User-facing label ("work account", "personal").
    pub label: String,

    /// Vault-encrypted API key or token for the upstream provider.
    /// Never serialized out to API responses.
    #[serde(skip_serializing)]
    pub encrypted_credential: String,

    /// Optional per-account base URL override (self-hosted gateways, regional
    /// endpoints). Falls back to the provider default when absent.
    pub base_url: Option<String>,

    pub is_active: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderAccount {
    /// Timestamp of the most recent dispatch touching this account, used for
    /// least-recently-used ordering within a provider.
    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        match (self.last_success_at, self.last_error_at) {
            (Some(s), Some(e)) => Some(s.max(e)),
            (Some(s), None) => Some(s),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }
}

/// Input for creating a provider account. The credential arrives in
/// plaintext from the caller and is encrypted before it reaches the store.
#[derive(Debug, Clone)]
pub struct NewProviderAccount {
    pub user_id: Uuid,
    pub provider: ProviderKind,
    pub label: String,
    pub encrypted_credential: String,
    pub base_url: Option<String>,
}

/// Partial update applied by explicit user action.
#[derive(Debug, Clone, Default)]
pub struct ProviderAccountUpdate {
    pub label: Option<String>,
    pub is_active: Option<bool>,
    pub base_url: Option<Option<String>>,
    pub encrypted_credential: Option<String>,
}
