use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::ProviderAccountRepo;
use crate::models::{NewProviderAccount, ProviderAccount, ProviderAccountUpdate, ProviderKind};

const COLUMNS: &str = "id, user_id, provider, label, encrypted_credential, base_url, \
     is_active, last_success_at, last_error_at, created_at, updated_at";

pub struct SqliteProviderAccountRepo {
    pool: SqlitePool,
}

impl SqliteProviderAccountRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_account(row: &sqlx::sqlite::SqliteRow) -> DbResult<ProviderAccount> {
        let provider: String = row.get("provider");

        Ok(ProviderAccount {
            id: Uuid::parse_str(row.get("id")).map_err(|e| DbError::Internal(e.to_string()))?,
            user_id: Uuid::parse_str(row.get("user_id"))
                .map_err(|e| DbError::Internal(e.to_string()))?,
            provider: provider
                .parse::<ProviderKind>()
                .map_err(|e| DbError::Internal(e.to_string()))?,
            label: row.get("label"),
            encrypted_credential: row.get("encrypted_credential"),
            base_url: row.get("base_url"),
            is_active: row.get("is_active"),
            last_success_at: row.get("last_success_at"),
            last_error_at: row.get("last_error_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ProviderAccountRepo for SqliteProviderAccountRepo {
    async fn create(&self, input: NewProviderAccount) -> DbResult<ProviderAccount> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO provider_accounts \
             (id, user_id, provider, label, encrypted_credential, base_url, is_active, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(input.user_id.to_string())
        .bind(input.provider.as_str())
        .bind(&input.label)
        .bind(&input.encrypted_credential)
        .bind(&input.base_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ProviderAccount {
            id,
            user_id: input.user_id,
            provider: input.provider,
            label: input.label,
            encrypted_credential: input.encrypted_credential,
            base_url: input.base_url,
            is_active: true,
            last_success_at: None,
            last_error_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> DbResult<ProviderAccount> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM provider_accounts WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        Self::parse_account(&row)
    }

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<ProviderAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM provider_accounts WHERE user_id = ? \
             ORDER BY provider, created_at, id"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_account).collect()
    }

    async fn list_active_for_providers(
        &self,
        user_id: Uuid,
        providers: &[ProviderKind],
    ) -> DbResult<Vec<ProviderAccount>> {
        if providers.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; providers.len()].join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM provider_accounts \
             WHERE user_id = ? AND is_active = 1 AND provider IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(user_id.to_string());
        for provider in providers {
            query = query.bind(provider.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_account).collect()
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: ProviderAccountUpdate,
    ) -> DbResult<ProviderAccount> {
        let mut account = self.get(user_id, id).await?;

        if let Some(label) = update.label {
            account.label = label;
        }
        if let Some(is_active) = update.is_active {
            account.is_active = is_active;
        }
        if let Some(base_url) = update.base_url {
            account.base_url = base_url;
        }
        if let Some(credential) = update.encrypted_credential {
            account.encrypted_credential = credential;
        }
        account.updated_at = Utc::now();

        sqlx::query(
            "UPDATE provider_accounts \
             SET label = ?, is_active = ?, base_url = ?, encrypted_credential = ?, updated_at = ? \
             WHERE id = ? AND user_id = ?",
        )
        .bind(&account.label)
        .bind(account.is_active)
        .bind(&account.base_url)
        .bind(&account.encrypted_credential)
        .bind(account.updated_at)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM provider_accounts WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn mark_success(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE provider_accounts SET last_success_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE provider_accounts SET last_error_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
