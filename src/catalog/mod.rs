//! The model catalog: canonical model ids, alias resolution, and provider
//! eligibility.
//!
//! A catalog is embedded at build time and loaded at startup; deployments can
//! point `[catalog] path` at a newer file without rebuilding.

mod registry;
mod types;

pub use registry::{CatalogError, CatalogRegistry, CatalogSnapshot};
pub use types::{CanonicalModel, CatalogFile};

/// The catalog compiled into the binary, used unless a path override is
/// configured.
pub const EMBEDDED_CATALOG: &str = include_str!("../../data/model-catalog.json");
