//! Type definitions for the model catalog.

use serde::{Deserialize, Serialize};

use crate::models::ProviderKind;

/// The catalog file: a flat list of model entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub models: Vec<CanonicalModel>,
}

/// A canonical model: one stable identifier, the aliases that resolve to it,
/// and the providers able to serve it (in preference order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalModel {
    /// The stable identifier (e.g. "claude-sonnet-4-5").
    pub id: String,

    /// Human-readable name.
    pub display_name: String,

    /// Display aliases that resolve to this model (e.g. dated snapshots,
    /// vendor-prefixed ids).
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Providers that can serve this model, in eligibility order. The
    /// dispatch engine tries accounts in this provider order.
    #[serde(default)]
    pub providers: Vec<ProviderKind>,

    /// Maximum context window (tokens), 0 when unknown.
    #[serde(default)]
    pub context_length: i64,

    /// Maximum output tokens, 0 when unknown.
    #[serde(default)]
    pub max_output_tokens: i64,
}
