//! Session validation is delegated to the external auth collaborator; the
//! core only defines the seam.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

/// Resolves a session token to a user id. `None` means the token is unknown
/// or expired; the caller maps that to an authentication error.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<Uuid>;
}

/// Fixed token-to-user map, for development deployments and tests. With an
/// empty map this doubles as a deny-all validator.
#[derive(Debug, Default)]
pub struct StaticSessionValidator {
    sessions: HashMap<String, Uuid>,
}

impl StaticSessionValidator {
    pub fn new(sessions: HashMap<String, Uuid>) -> Self {
        Self { sessions }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Option<Uuid> {
        self.sessions.get(token).copied()
    }
}
