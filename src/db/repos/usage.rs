use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::{NewUsageRecord, UsageAggregate, UsageGroupBy, UsageRecord};

#[async_trait]
pub trait UsageRepo: Send + Sync {
    /// Append one immutable record. The dispatch engine swallows and logs
    /// failures from this call; it must never mask the primary response.
    async fn append(&self, record: NewUsageRecord) -> DbResult<UsageRecord>;

    async fn aggregate(
        &self,
        user_id: Uuid,
        group_by: UsageGroupBy,
    ) -> DbResult<Vec<UsageAggregate>>;

    async fn list_recent(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<UsageRecord>>;
}
