//! SQLite implementations of the repository traits.

mod accounts;
mod api_keys;
mod disabled_models;
mod usage;
mod users;

pub use accounts::SqliteProviderAccountRepo;
pub use api_keys::SqliteApiKeyRepo;
pub use disabled_models::SqliteDisabledModelRepo;
pub use usage::SqliteUsageRepo;
pub use users::SqliteUserRepo;
