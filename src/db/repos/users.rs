use async_trait::async_trait;
use uuid::Uuid;

use crate::db::error::DbResult;
use crate::models::{NewUser, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, input: NewUser) -> DbResult<User>;

    async fn get(&self, id: Uuid) -> DbResult<User>;

    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>>;
}
