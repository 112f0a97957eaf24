use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;

/// Per-user suppression of canonical models, composed (AND) with the
/// key-level access mode.
#[async_trait]
pub trait DisabledModelRepo: Send + Sync {
    /// Idempotent: disabling an already-disabled model is a no-op.
    async fn disable(&self, user_id: Uuid, model_id: &str) -> DbResult<()>;

    /// Idempotent: enabling a model that was never disabled is a no-op.
    async fn enable(&self, user_id: Uuid, model_id: &str) -> DbResult<()>;

    async fn list(&self, user_id: Uuid) -> DbResult<HashSet<String>>;
}
