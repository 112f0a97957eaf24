use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::db::repos::DisabledModelRepo;

pub struct SqliteDisabledModelRepo {
    pool: SqlitePool,
}

impl SqliteDisabledModelRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DisabledModelRepo for SqliteDisabledModelRepo {
    async fn disable(&self, user_id: Uuid, model_id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO disabled_models (user_id, model_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, model_id) DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(model_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enable(&self, user_id: Uuid, model_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM disabled_models WHERE user_id = ? AND model_id = ?")
            .bind(user_id.to_string())
            .bind(model_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> DbResult<HashSet<String>> {
        let rows = sqlx::query("SELECT model_id FROM disabled_models WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("model_id")).collect())
    }
}
