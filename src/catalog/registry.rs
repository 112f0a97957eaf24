//! The in-memory catalog snapshot and its registry.
//!
//! Reads take a cheap `Arc` clone of the current snapshot; refresh replaces
//! the whole snapshot under a short write lock. Nothing is mutated in place,
//! so concurrent readers never observe a half-built catalog.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::types::{CatalogFile, CanonicalModel};
use crate::models::ProviderKind;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
}

/// An immutable view of the catalog at one point in time.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    /// Models sorted lexicographically by id, deduplicated first-wins.
    models: Vec<CanonicalModel>,
    /// Canonical id -> index into `models`.
    model_index: HashMap<String, usize>,
    /// Alias -> canonical id. First mapping wins.
    alias_index: HashMap<String, String>,
}

impl CatalogSnapshot {
    /// Build a snapshot from raw entries.
    ///
    /// Duplicate canonical ids keep the first-seen entry's metadata; later
    /// duplicates are dropped entirely, aliases included. This keeps listing
    /// counts and ordering stable across refreshes of a sloppy source file.
    fn build(raw: Vec<CanonicalModel>) -> Self {
        let mut models: Vec<CanonicalModel> = Vec::with_capacity(raw.len());
        let mut model_index = HashMap::new();
        let mut alias_index = HashMap::new();

        for entry in raw {
            if model_index.contains_key(&entry.id) {
                continue;
            }
            for alias in &entry.aliases {
                alias_index
                    .entry(alias.clone())
                    .or_insert_with(|| entry.id.clone());
            }
            model_index.insert(entry.id.clone(), models.len());
            models.push(entry);
        }

        models.sort_by(|a, b| a.id.cmp(&b.id));
        let model_index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();

        Self {
            models,
            model_index,
            alias_index,
        }
    }

    /// Resolve a requested id to its canonical id.
    ///
    /// Total: canonical ids map to themselves, known aliases to their
    /// canonical id, and unknown ids to themselves (treated as already
    /// canonical). Idempotent by construction.
    pub fn resolve_alias<'a>(&'a self, id: &'a str) -> &'a str {
        if self.model_index.contains_key(id) {
            return id;
        }
        match self.alias_index.get(id) {
            Some(canonical) => canonical,
            None => id,
        }
    }

    pub fn get(&self, canonical_id: &str) -> Option<&CanonicalModel> {
        self.model_index
            .get(canonical_id)
            .map(|&i| &self.models[i])
    }

    /// All models, lexicographic by id.
    pub fn models(&self) -> &[CanonicalModel] {
        &self.models
    }

    /// Providers able to serve a model, in eligibility order. Empty for
    /// unknown ids.
    pub fn eligible_providers(&self, canonical_id: &str) -> &[ProviderKind] {
        self.get(canonical_id)
            .map(|m| m.providers.as_slice())
            .unwrap_or(&[])
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// Shared handle to the current catalog snapshot.
#[derive(Clone, Default)]
pub struct CatalogRegistry {
    inner: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse catalog JSON and atomically replace the current snapshot.
    pub fn load_from_json(&self, json: &str) -> Result<(), CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let snapshot = Arc::new(CatalogSnapshot::build(file.models));
        *self.inner.write() = snapshot;
        Ok(())
    }

    /// Load a catalog from a file on disk, replacing the current snapshot.
    pub fn load_from_path(&self, path: &std::path::Path) -> Result<(), CatalogError> {
        let json = std::fs::read_to_string(path)?;
        self.load_from_json(&json)
    }

    /// The current snapshot. Callers hold it for the duration of one request
    /// at most; refreshes never block readers of an old snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_from(json: &str) -> CatalogRegistry {
        let registry = CatalogRegistry::new();
        registry.load_from_json(json).unwrap();
        registry
    }

    const SMALL_CATALOG: &str = r#"{
        "models": [
            {
                "id": "gpt-4o",
                "display_name": "GPT-4o",
                "aliases": ["gpt-4o-2024-11-20", "openai/gpt-4o"],
                "providers": ["openai", "openrouter"]
            },
            {
                "id": "claude-sonnet-4-5",
                "display_name": "Claude Sonnet 4.5",
                "aliases": ["claude-sonnet-4-5-20250929"],
                "providers": ["anthropic"]
            }
        ]
    }"#;

    #[test]
    fn test_resolve_alias_known() {
        let registry = registry_from(SMALL_CATALOG);
        let snap = registry.snapshot();
        assert_eq!(snap.resolve_alias("gpt-4o-2024-11-20"), "gpt-4o");
        assert_eq!(snap.resolve_alias("openai/gpt-4o"), "gpt-4o");
        assert_eq!(snap.resolve_alias("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_resolve_alias_unknown_is_identity() {
        let registry = registry_from(SMALL_CATALOG);
        let snap = registry.snapshot();
        assert_eq!(snap.resolve_alias("made-up-model"), "made-up-model");
    }

    #[test]
    fn test_resolve_alias_idempotent() {
        let registry = registry_from(SMALL_CATALOG);
        let snap = registry.snapshot();
        for id in [
            "gpt-4o",
            "gpt-4o-2024-11-20",
            "claude-sonnet-4-5-20250929",
            "made-up-model",
        ] {
            let once = snap.resolve_alias(id);
            assert_eq!(snap.resolve_alias(once), once);
        }
    }

    #[test]
    fn test_duplicate_canonical_id_first_wins() {
        let registry = registry_from(
            r#"{
                "models": [
                    {"id": "m1", "display_name": "First", "providers": ["openai"]},
                    {"id": "m1", "display_name": "Second", "providers": ["anthropic"]},
                    {"id": "m2", "display_name": "Other"}
                ]
            }"#,
        );
        let snap = registry.snapshot();
        assert_eq!(snap.model_count(), 2);
        let m1 = snap.get("m1").unwrap();
        assert_eq!(m1.display_name, "First");
        assert_eq!(m1.providers, vec![crate::models::ProviderKind::OpenAi]);
    }

    #[test]
    fn test_duplicate_alias_first_wins() {
        let registry = registry_from(
            r#"{
                "models": [
                    {"id": "m1", "display_name": "M1", "aliases": ["shared"]},
                    {"id": "m2", "display_name": "M2", "aliases": ["shared"]}
                ]
            }"#,
        );
        let snap = registry.snapshot();
        assert_eq!(snap.resolve_alias("shared"), "m1");
    }

    #[test]
    fn test_listing_is_lexicographic() {
        let registry = registry_from(SMALL_CATALOG);
        let snap = registry.snapshot();
        let ids: Vec<_> = snap.models().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["claude-sonnet-4-5", "gpt-4o"]);
    }

    #[test]
    fn test_eligible_providers_order_preserved() {
        let registry = registry_from(SMALL_CATALOG);
        let snap = registry.snapshot();
        assert_eq!(
            snap.eligible_providers("gpt-4o"),
            &[
                crate::models::ProviderKind::OpenAi,
                crate::models::ProviderKind::OpenRouter
            ]
        );
        assert!(snap.eligible_providers("unknown").is_empty());
    }

    #[test]
    fn test_refresh_replaces_snapshot() {
        let registry = registry_from(SMALL_CATALOG);
        let before = registry.snapshot();
        registry
            .load_from_json(r#"{"models": [{"id": "only", "display_name": "Only"}]}"#)
            .unwrap();
        let after = registry.snapshot();

        // Old snapshot still readable by holders; new one reflects the reload.
        assert_eq!(before.model_count(), 2);
        assert_eq!(after.model_count(), 1);
    }
}
