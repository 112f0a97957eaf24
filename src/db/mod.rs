//! Storage facade: one pool, repositories cached as trait objects.

mod error;
pub mod repos;
pub mod sqlite;

use std::str::FromStr;
use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    users: Arc<dyn UserRepo>,
    api_keys: Arc<dyn ApiKeyRepo>,
    accounts: Arc<dyn ProviderAccountRepo>,
    usage: Arc<dyn UsageRepo>,
    disabled_models: Arc<dyn DisabledModelRepo>,
}

/// The database handle held by application state.
pub struct DbPool {
    pool: SqlitePool,
    repos: CachedRepos,
}

impl DbPool {
    /// Open (or create) the configured SQLite database and run migrations if
    /// the config asks for it.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.path)
            .map_err(DbError::Sqlx)?
            .create_if_missing(config.create_if_missing);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let db = Self::from_pool(pool);
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        let repos = CachedRepos {
            users: Arc::new(sqlite::SqliteUserRepo::new(pool.clone())),
            api_keys: Arc::new(sqlite::SqliteApiKeyRepo::new(pool.clone())),
            accounts: Arc::new(sqlite::SqliteProviderAccountRepo::new(pool.clone())),
            usage: Arc::new(sqlite::SqliteUsageRepo::new(pool.clone())),
            disabled_models: Arc::new(sqlite::SqliteDisabledModelRepo::new(pool.clone())),
        };
        Self { pool, repos }
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    pub fn users(&self) -> Arc<dyn UserRepo> {
        self.repos.users.clone()
    }

    pub fn api_keys(&self) -> Arc<dyn ApiKeyRepo> {
        self.repos.api_keys.clone()
    }

    pub fn accounts(&self) -> Arc<dyn ProviderAccountRepo> {
        self.repos.accounts.clone()
    }

    pub fn usage(&self) -> Arc<dyn UsageRepo> {
        self.repos.usage.clone()
    }

    pub fn disabled_models(&self) -> Arc<dyn DisabledModelRepo> {
        self.repos.disabled_models.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::{
        ModelAccessMode, NewApiKey, NewProviderAccount, NewUsageRecord, NewUser,
        ProviderAccountUpdate, ProviderKind, UsageGroupBy,
    };

    async fn test_db() -> DbPool {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let db_id = COUNTER.fetch_add(1, Ordering::SeqCst);

        let config = DatabaseConfig {
            path: format!("file:repo_test_db_{db_id}?mode=memory&cache=shared"),
            create_if_missing: true,
            run_migrations: true,
            max_connections: 5,
        };
        DbPool::from_config(&config).await.expect("test db")
    }

    async fn seed_user(db: &DbPool) -> Uuid {
        db.users()
            .create(NewUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                display_name: None,
            })
            .await
            .unwrap()
            .id
    }

    fn account_input(user_id: Uuid, provider: ProviderKind) -> NewProviderAccount {
        NewProviderAccount {
            user_id,
            provider,
            label: "test account".to_string(),
            encrypted_credential: "ciphertext".to_string(),
            base_url: None,
        }
    }

    #[tokio::test]
    async fn test_user_email_unique() {
        let db = test_db().await;
        db.users()
            .create(NewUser {
                email: "dup@example.com".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        let err = db
            .users()
            .create(NewUser {
                email: "dup@example.com".to_string(),
                display_name: Some("Other".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_api_key_round_trip_by_hash() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;

        let created = db
            .api_keys()
            .create(NewApiKey {
                user_id,
                name: "ci key".to_string(),
                key_prefix: "gk_live_abcd".to_string(),
                key_hash: "deadbeef".to_string(),
                encrypted_key: "ct".to_string(),
                expires_at: Some(Utc::now() + Duration::days(30)),
                model_access_mode: ModelAccessMode::Whitelist,
                model_access_list: vec!["gpt-4o".to_string()],
            })
            .await
            .unwrap();

        let found = db.api_keys().get_by_hash("deadbeef").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.model_access_mode, ModelAccessMode::Whitelist);
        assert_eq!(found.model_access_list, vec!["gpt-4o"]);
        assert!(found.is_active);
        assert!(found.expires_at.is_some());

        assert!(db.api_keys().get_by_hash("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_key_revoke_and_scope() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;
        let other_user = seed_user(&db).await;

        let key = db
            .api_keys()
            .create(NewApiKey {
                user_id,
                name: "k".to_string(),
                key_prefix: "gk_live_xyz1".to_string(),
                key_hash: "hash1".to_string(),
                encrypted_key: "ct".to_string(),
                expires_at: None,
                model_access_mode: ModelAccessMode::All,
                model_access_list: vec![],
            })
            .await
            .unwrap();

        // Another user cannot revoke it.
        let err = db.api_keys().revoke(other_user, key.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));

        db.api_keys().revoke(user_id, key.id).await.unwrap();
        let fetched = db.api_keys().get(user_id, key.id).await.unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn test_account_health_marks() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;
        let account = db
            .accounts()
            .create(account_input(user_id, ProviderKind::OpenAi))
            .await
            .unwrap();
        assert!(account.last_success_at.is_none());

        let at = Utc::now();
        db.accounts().mark_success(account.id, at).await.unwrap();
        db.accounts().mark_error(account.id, at).await.unwrap();

        let fetched = db.accounts().get(user_id, account.id).await.unwrap();
        assert!(fetched.last_success_at.is_some());
        assert!(fetched.last_error_at.is_some());
    }

    #[tokio::test]
    async fn test_list_active_for_providers_filters() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;

        let openai = db
            .accounts()
            .create(account_input(user_id, ProviderKind::OpenAi))
            .await
            .unwrap();
        let anthropic = db
            .accounts()
            .create(account_input(user_id, ProviderKind::Anthropic))
            .await
            .unwrap();
        db.accounts()
            .create(account_input(user_id, ProviderKind::Groq))
            .await
            .unwrap();

        // Deactivate the anthropic account; it must disappear.
        db.accounts()
            .update(
                user_id,
                anthropic.id,
                ProviderAccountUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let candidates = db
            .accounts()
            .list_active_for_providers(
                user_id,
                &[ProviderKind::OpenAi, ProviderKind::Anthropic],
            )
            .await
            .unwrap();
        let ids: Vec<_> = candidates.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![openai.id]);

        // Accounts of other users never leak in.
        let stranger = seed_user(&db).await;
        let candidates = db
            .accounts()
            .list_active_for_providers(stranger, &[ProviderKind::OpenAi])
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_usage_append_and_aggregate() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;
        let account_id = Uuid::new_v4();

        for (model, status, input, output) in [
            ("gpt-4o", Some(200u16), 100i64, 20i64),
            ("gpt-4o", Some(502), 0, 0),
            ("claude-sonnet-4-5", Some(200), 50, 10),
        ] {
            db.usage()
                .append(NewUsageRecord {
                    user_id,
                    account_id: Some(account_id),
                    api_key_id: None,
                    model: model.to_string(),
                    input_tokens: input,
                    output_tokens: output,
                    status_code: status,
                    duration_ms: 12,
                })
                .await
                .unwrap();
        }

        let by_model = db
            .usage()
            .aggregate(user_id, UsageGroupBy::Model)
            .await
            .unwrap();
        assert_eq!(by_model.len(), 2);
        let gpt = by_model.iter().find(|a| a.key == "gpt-4o").unwrap();
        assert_eq!(gpt.request_count, 2);
        assert_eq!(gpt.success_count, 1);
        assert_eq!(gpt.input_tokens, 100);

        let by_day = db
            .usage()
            .aggregate(user_id, UsageGroupBy::Day)
            .await
            .unwrap();
        assert_eq!(by_day.len(), 1);
        assert_eq!(by_day[0].request_count, 3);

        let recent = db.usage().list_recent(user_id, 10).await.unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_models_idempotent() {
        let db = test_db().await;
        let user_id = seed_user(&db).await;

        db.disabled_models().disable(user_id, "gpt-4o").await.unwrap();
        db.disabled_models().disable(user_id, "gpt-4o").await.unwrap();
        let set = db.disabled_models().list(user_id).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("gpt-4o"));

        db.disabled_models().enable(user_id, "gpt-4o").await.unwrap();
        db.disabled_models().enable(user_id, "gpt-4o").await.unwrap();
        assert!(db.disabled_models().list(user_id).await.unwrap().is_empty());
    }
}
