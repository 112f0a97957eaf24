//! Access control: credential extraction, API-key validation, and session
//! delegation.
//!
//! Exactly one path is tried per request. An API-key-shaped header
//! (`Authorization: Bearer` or `x-api-key`) always takes the key path; a
//! failing key is a hard authentication error, never a silent fall-through
//! to the session cookie.

mod session;

use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

pub use session::{SessionValidator, StaticSessionValidator};

use crate::db::{ApiKeyRepo, DbError};
use crate::models::api_key::model_allowed;
use crate::models::api_key_gen::{has_valid_prefix, hash_api_key, verify_api_key};
use crate::models::ModelAccessMode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,

    #[error("invalid credentials")]
    Invalid,

    #[error("API key has been revoked")]
    Revoked,

    #[error("API key has expired")]
    Expired,
}

/// The inbound credential, tagged by which header supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Session(String),
}

impl Credential {
    /// Two-arm resolution: key-shaped headers win, then the session cookie.
    pub fn from_headers(headers: &HeaderMap, session_cookie: &str) -> Option<Credential> {
        if let Some(value) = headers.get(axum::http::header::AUTHORIZATION)
            && let Ok(value) = value.to_str()
            && let Some(token) = value.strip_prefix("Bearer ")
        {
            return Some(Credential::ApiKey(token.trim().to_string()));
        }

        if let Some(value) = headers.get("x-api-key")
            && let Ok(value) = value.to_str()
        {
            return Some(Credential::ApiKey(value.trim().to_string()));
        }

        let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == session_cookie).then(|| Credential::Session(value.to_string()))
        })
    }
}

/// The authenticated principal plus its key-level model filter.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    /// Present when the key path authenticated the request.
    pub api_key_id: Option<Uuid>,
    pub access_mode: ModelAccessMode,
    pub access_list: Vec<String>,
}

impl AuthContext {
    /// Key-level filter only. The per-user disabled-model set is a separate,
    /// ANDed check owned by the dispatch path.
    pub fn model_allowed(&self, canonical_id: &str) -> bool {
        model_allowed(self.access_mode, &self.access_list, canonical_id)
    }
}

/// Validates credentials into an [`AuthContext`].
#[derive(Clone)]
pub struct Authenticator {
    api_keys: Arc<dyn ApiKeyRepo>,
    sessions: Arc<dyn SessionValidator>,
    task_tracker: TaskTracker,
}

impl Authenticator {
    pub fn new(
        api_keys: Arc<dyn ApiKeyRepo>,
        sessions: Arc<dyn SessionValidator>,
        task_tracker: TaskTracker,
    ) -> Self {
        Self {
            api_keys,
            sessions,
            task_tracker,
        }
    }

    pub async fn authenticate(
        &self,
        credential: Option<Credential>,
    ) -> Result<AuthContext, AuthError> {
        match credential {
            None => Err(AuthError::Missing),
            Some(Credential::ApiKey(secret)) => self.authenticate_key(&secret).await,
            Some(Credential::Session(token)) => self.authenticate_session(&token).await,
        }
    }

    async fn authenticate_key(&self, secret: &str) -> Result<AuthContext, AuthError> {
        if !has_valid_prefix(secret) {
            return Err(AuthError::Invalid);
        }
        let digest = hash_api_key(secret);
        let key = match self.api_keys.get_by_hash(&digest).await {
            Ok(Some(key)) => key,
            Ok(None) => return Err(AuthError::Invalid),
            Err(e) => {
                tracing::error!(error = %e, "API key lookup failed");
                return Err(AuthError::Invalid);
            }
        };

        if !verify_api_key(secret, &key.key_hash) {
            return Err(AuthError::Invalid);
        }
        if !key.is_active {
            return Err(AuthError::Revoked);
        }
        if key.is_expired(chrono::Utc::now()) {
            return Err(AuthError::Expired);
        }

        // Best-effort; must never block or fail the auth decision
        let repo = self.api_keys.clone();
        let key_id = key.id;
        self.task_tracker.spawn(async move {
            if let Err(e) = repo.update_last_used(key_id).await
                && !matches!(e, DbError::NotFound)
            {
                tracing::warn!(key_id = %key_id, error = %e, "last-used update failed");
            }
        });

        Ok(AuthContext {
            user_id: key.user_id,
            api_key_id: Some(key.id),
            access_mode: key.model_access_mode,
            access_list: key.model_access_list,
        })
    }

    async fn authenticate_session(&self, token: &str) -> Result<AuthContext, AuthError> {
        match self.sessions.validate(token).await {
            Some(user_id) => Ok(AuthContext {
                user_id,
                api_key_id: None,
                access_mode: ModelAccessMode::All,
                access_list: Vec::new(),
            }),
            None => Err(AuthError::Invalid),
        }
    }
}
