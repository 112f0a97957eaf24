use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::UsageRepo;
use crate::models::{NewUsageRecord, UsageAggregate, UsageGroupBy, UsageRecord};

pub struct SqliteUsageRepo {
    pool: SqlitePool,
}

impl SqliteUsageRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_record(row: &sqlx::sqlite::SqliteRow) -> DbResult<UsageRecord> {
        let parse_opt_uuid = |value: Option<String>| -> DbResult<Option<Uuid>> {
            value
                .map(|s| Uuid::parse_str(&s).map_err(|e| DbError::Internal(e.to_string())))
                .transpose()
        };

        Ok(UsageRecord {
            id: Uuid::parse_str(row.get("id")).map_err(|e| DbError::Internal(e.to_string()))?,
            user_id: Uuid::parse_str(row.get("user_id"))
                .map_err(|e| DbError::Internal(e.to_string()))?,
            account_id: parse_opt_uuid(row.get("account_id"))?,
            api_key_id: parse_opt_uuid(row.get("api_key_id"))?,
            model: row.get("model"),
            input_tokens: row.get("input_tokens"),
            output_tokens: row.get("output_tokens"),
            status_code: row.get::<Option<i64>, _>("status_code").map(|s| s as u16),
            duration_ms: row.get("duration_ms"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl UsageRepo for SqliteUsageRepo {
    async fn append(&self, record: NewUsageRecord) -> DbResult<UsageRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO usage_records \
             (id, user_id, account_id, api_key_id, model, input_tokens, output_tokens, \
              status_code, duration_ms, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.account_id.map(|a| a.to_string()))
        .bind(record.api_key_id.map(|k| k.to_string()))
        .bind(&record.model)
        .bind(record.input_tokens)
        .bind(record.output_tokens)
        .bind(record.status_code.map(|s| s as i64))
        .bind(record.duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(UsageRecord {
            id,
            user_id: record.user_id,
            account_id: record.account_id,
            api_key_id: record.api_key_id,
            model: record.model,
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
            status_code: record.status_code,
            duration_ms: record.duration_ms,
            created_at: now,
        })
    }

    async fn aggregate(
        &self,
        user_id: Uuid,
        group_by: UsageGroupBy,
    ) -> DbResult<Vec<UsageAggregate>> {
        // created_at is RFC 3339, so its first 10 characters are the UTC day
        let key_expr = match group_by {
            UsageGroupBy::Model => "model",
            UsageGroupBy::Day => "substr(created_at, 1, 10)",
            UsageGroupBy::Account => "COALESCE(account_id, '')",
        };

        let sql = format!(
            "SELECT {key_expr} AS agg_key, \
                    COUNT(*) AS request_count, \
                    SUM(CASE WHEN status_code >= 200 AND status_code < 300 THEN 1 ELSE 0 END) \
                        AS success_count, \
                    SUM(input_tokens) AS input_tokens, \
                    SUM(output_tokens) AS output_tokens, \
                    SUM(duration_ms) AS total_duration_ms \
             FROM usage_records WHERE user_id = ? \
             GROUP BY agg_key ORDER BY agg_key"
        );

        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| UsageAggregate {
                key: row.get("agg_key"),
                request_count: row.get("request_count"),
                success_count: row.get("success_count"),
                input_tokens: row.get("input_tokens"),
                output_tokens: row.get("output_tokens"),
                total_duration_ms: row.get("total_duration_ms"),
            })
            .collect())
    }

    async fn list_recent(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<UsageRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, account_id, api_key_id, model, input_tokens, output_tokens, \
                    status_code, duration_ms, created_at \
             FROM usage_records WHERE user_id = ? \
             ORDER BY created_at DESC, id LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_record).collect()
    }
}
