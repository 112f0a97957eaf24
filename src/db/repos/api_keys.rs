use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::{ApiKey, NewApiKey};

#[async_trait]
pub trait ApiKeyRepo: Send + Sync {
    async fn create(&self, input: NewApiKey) -> DbResult<ApiKey>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> DbResult<ApiKey>;

    /// Lookup by secret digest. Unscoped: the digest is unique across users
    /// and is the only thing an inbound request carries.
    async fn get_by_hash(&self, key_hash: &str) -> DbResult<Option<ApiKey>>;

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<ApiKey>>;

    async fn revoke(&self, user_id: Uuid, id: Uuid) -> DbResult<()>;

    /// Best-effort last-used stamp; callers fire-and-forget this.
    async fn update_last_used(&self, id: Uuid) -> DbResult<()>;
}
