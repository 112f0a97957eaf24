use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::ApiKeyRepo;
use crate::models::{ApiKey, ModelAccessMode, NewApiKey};

const COLUMNS: &str = "id, user_id, name, key_prefix, key_hash, encrypted_key, is_active, \
     expires_at, model_access_mode, model_access_list, last_used_at, created_at";

pub struct SqliteApiKeyRepo {
    pool: SqlitePool,
}

impl SqliteApiKeyRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_api_key(row: &sqlx::sqlite::SqliteRow) -> DbResult<ApiKey> {
        let mode: String = row.get("model_access_mode");
        let list: String = row.get("model_access_list");

        Ok(ApiKey {
            id: Uuid::parse_str(row.get("id")).map_err(|e| DbError::Internal(e.to_string()))?,
            user_id: Uuid::parse_str(row.get("user_id"))
                .map_err(|e| DbError::Internal(e.to_string()))?,
            name: row.get("name"),
            key_prefix: row.get("key_prefix"),
            key_hash: row.get("key_hash"),
            encrypted_key: row.get("encrypted_key"),
            is_active: row.get("is_active"),
            expires_at: row.get("expires_at"),
            model_access_mode: ModelAccessMode::parse(&mode)
                .ok_or_else(|| DbError::Internal(format!("invalid access mode: {mode}")))?,
            model_access_list: serde_json::from_str(&list)?,
            last_used_at: row.get("last_used_at"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ApiKeyRepo for SqliteApiKeyRepo {
    async fn create(&self, input: NewApiKey) -> DbResult<ApiKey> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let list_json = serde_json::to_string(&input.model_access_list)?;

        sqlx::query(
            "INSERT INTO api_keys \
             (id, user_id, name, key_prefix, key_hash, encrypted_key, is_active, \
              expires_at, model_access_mode, model_access_list, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(input.user_id.to_string())
        .bind(&input.name)
        .bind(&input.key_prefix)
        .bind(&input.key_hash)
        .bind(&input.encrypted_key)
        .bind(input.expires_at)
        .bind(input.model_access_mode.as_str())
        .bind(&list_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Conflict("API key digest collision".to_string())
            }
            other => DbError::Sqlx(other),
        })?;

        Ok(ApiKey {
            id,
            user_id: input.user_id,
            name: input.name,
            key_prefix: input.key_prefix,
            key_hash: input.key_hash,
            encrypted_key: input.encrypted_key,
            is_active: true,
            expires_at: input.expires_at,
            model_access_mode: input.model_access_mode,
            model_access_list: input.model_access_list,
            last_used_at: None,
            created_at: now,
        })
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> DbResult<ApiKey> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        Self::parse_api_key(&row)
    }

    async fn get_by_hash(&self, key_hash: &str) -> DbResult<Option<ApiKey>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM api_keys WHERE key_hash = ?"))
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::parse_api_key(&r)).transpose()
    }

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<ApiKey>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE user_id = ? ORDER BY created_at DESC, id"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_api_key).collect()
    }

    async fn revoke(&self, user_id: Uuid, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn update_last_used(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
