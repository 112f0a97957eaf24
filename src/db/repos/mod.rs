//! Repository traits: the narrow contract the core consumes from storage.
//!
//! Every operation is scoped by the owning user id except the two lookups
//! the hot path needs unscoped: API-key-by-digest (the digest is the
//! identity) and health-timestamp updates (the engine already holds the
//! account row).

mod accounts;
mod api_keys;
mod disabled_models;
mod usage;
mod users;

pub use accounts::ProviderAccountRepo;
pub use api_keys::ApiKeyRepo;
pub use disabled_models::DisabledModelRepo;
pub use usage::UsageRepo;
pub use users::UserRepo;
