//! Domain types shared across the crate.

pub mod account;
pub mod api_key;
pub mod api_key_gen;
pub mod provider;
pub mod usage;
pub mod user;

pub use account::{NewProviderAccount, ProviderAccount, ProviderAccountUpdate};
pub use api_key::{ApiKey, ModelAccessMode, NewApiKey};
pub use provider::{ProviderKind, WireFlavor};
pub use usage::{NewUsageRecord, UsageAggregate, UsageGroupBy, UsageRecord};
pub use user::{NewUser, User};
