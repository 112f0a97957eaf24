use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::{NewProviderAccount, ProviderAccount, ProviderAccountUpdate, ProviderKind};

#[async_trait]
pub trait ProviderAccountRepo: Send + Sync {
    async fn create(&self, input: NewProviderAccount) -> DbResult<ProviderAccount>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> DbResult<ProviderAccount>;

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<ProviderAccount>>;

    /// Active accounts for the given providers, one fetch per dispatch.
    /// Ordering is left to the caller (the account pool).
    async fn list_active_for_providers(
        &self,
        user_id: Uuid,
        providers: &[ProviderKind],
    ) -> DbResult<Vec<ProviderAccount>>;

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: ProviderAccountUpdate,
    ) -> DbResult<ProviderAccount>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> DbResult<()>;

    /// Single-row health stamps. Last-writer-wins across concurrent
    /// requests; the fields are monitoring hints, not correctness state.
    async fn mark_success(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()>;

    async fn mark_error(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()>;
}
