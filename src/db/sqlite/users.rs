use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};
use crate::db::repos::UserRepo;
use crate::models::{NewUser, User};

pub struct SqliteUserRepo {
    pool: SqlitePool,
}

impl SqliteUserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_user(row: &sqlx::sqlite::SqliteRow) -> DbResult<User> {
        Ok(User {
            id: Uuid::parse_str(row.get("id")).map_err(|e| DbError::Internal(e.to_string()))?,
            email: row.get("email"),
            display_name: row.get("display_name"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl UserRepo for SqliteUserRepo {
    async fn create(&self, input: NewUser) -> DbResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Conflict(format!("user with email {} already exists", input.email))
            }
            other => DbError::Sqlx(other),
        })?;

        Ok(User {
            id,
            email: input.email,
            display_name: input.display_name,
            created_at: now,
        })
    }

    async fn get(&self, id: Uuid) -> DbResult<User> {
        let row = sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;
        Self::parse_user(&row)
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row =
            sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| Self::parse_user(&r)).transpose()
    }
}
