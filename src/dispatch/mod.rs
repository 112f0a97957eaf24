//! The dispatch engine: resolve, authorize, select, attempt, rotate.
//!
//! The attempt loop is strictly sequential within one request; failover
//! depends on the previous attempt's outcome. No lock is held across any
//! await. Exactly one usage record is appended per dispatch, synchronously,
//! before the outcome is returned.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::ordered_candidates;
use crate::auth::AuthContext;
use crate::catalog::CatalogRegistry;
use crate::db::DbPool;
use crate::models::{NewUsageRecord, ProviderAccount};
use crate::transport::{
    AccountCredentials, TransportError, TransportRegistry, TransportResponse,
};
use crate::vault::Vault;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request body must include a model")]
    MissingModel,

    /// Unknown model and model-filtered-out share one variant (and one
    /// message) so callers cannot probe catalog membership.
    #[error("model not found or not accessible: {model}")]
    ModelNotAvailable { model: String },

    #[error("no account available for model: {model}")]
    NoCandidate { model: String },

    /// Non-retryable upstream failure; rotation stopped immediately.
    #[error("upstream rejected the request with status {status}")]
    Terminal { status: u16 },

    /// Every candidate account was tried and failed with a retryable error.
    #[error("all {attempts} accounts failed for this request")]
    Exhausted {
        attempts: usize,
        last_status: Option<u16>,
    },

    #[error("internal dispatch failure: {0}")]
    Internal(String),
}

/// Whether a failed attempt should advance to the next candidate account.
///
/// Credential and quota failures (401, 402, 403, 429) are account-specific
/// here: every account carries its own upstream key, so the next one may
/// well succeed. 408 and 5xx are transient. Every other 4xx means the
/// request itself is bad and would fail identically on every account.
pub fn should_rotate_to_next_account(status: u16) -> bool {
    matches!(status, 401 | 402 | 403 | 408 | 429) || status >= 500
}

/// A successful dispatch: the upstream status and body to hand back.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub status: u16,
    pub body: Bytes,
    pub model: String,
}

#[derive(Clone)]
pub struct DispatchEngine {
    db: Arc<DbPool>,
    catalog: CatalogRegistry,
    vault: Arc<Vault>,
    transports: TransportRegistry,
    http: reqwest::Client,
}

impl DispatchEngine {
    pub fn new(
        db: Arc<DbPool>,
        catalog: CatalogRegistry,
        vault: Arc<Vault>,
        transports: TransportRegistry,
        http: reqwest::Client,
    ) -> Self {
        Self {
            db,
            catalog,
            vault,
            transports,
            http,
        }
    }

    /// Drive one chat-completion request through the full state machine.
    #[tracing::instrument(skip(self, ctx, request), fields(user_id = %ctx.user_id))]
    pub async fn dispatch_chat(
        &self,
        ctx: &AuthContext,
        request: serde_json::Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let started = Instant::now();

        // RESOLVING
        let requested = request
            .get("model")
            .and_then(serde_json::Value::as_str)
            .ok_or(DispatchError::MissingModel)?;
        let snapshot = self.catalog.snapshot();
        let canonical = snapshot.resolve_alias(requested).to_string();

        // AUTHORIZING: key-level mode filter AND per-user disabled set.
        // Denied requests never touch an account and are logged, not recorded.
        if !ctx.model_allowed(&canonical) {
            tracing::info!(model = %canonical, "model denied by key access mode");
            return Err(DispatchError::ModelNotAvailable { model: canonical });
        }
        let disabled = self
            .db
            .disabled_models()
            .list(ctx.user_id)
            .await
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        if disabled.contains(&canonical) {
            tracing::info!(model = %canonical, "model disabled by user");
            return Err(DispatchError::ModelNotAvailable { model: canonical });
        }
        let eligible = snapshot.eligible_providers(&canonical);
        if eligible.is_empty() {
            return Err(DispatchError::ModelNotAvailable { model: canonical });
        }

        // SELECTING
        let accounts = self
            .db
            .accounts()
            .list_active_for_providers(ctx.user_id, eligible)
            .await
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let candidates = ordered_candidates(accounts, eligible);
        if candidates.is_empty() {
            return Err(DispatchError::NoCandidate { model: canonical });
        }

        // ATTEMPTING / ROTATING
        let mut attempts = 0usize;
        let mut last_status: Option<u16> = None;
        let mut last_account: Option<Uuid> = None;

        for account in &candidates {
            let credentials = match self.decrypt_credentials(account) {
                Some(credentials) => credentials,
                None => continue,
            };
            attempts += 1;
            last_account = Some(account.id);

            let transport = self.transports.for_flavor(account.provider.wire_flavor());
            match transport
                .send(&self.http, &credentials, &canonical, &request)
                .await
            {
                Ok(response) if response.is_success() => {
                    self.mark_success(account).await;
                    self.record_usage(
                        ctx,
                        Some(account.id),
                        &canonical,
                        &response,
                        started,
                    )
                    .await;
                    return Ok(DispatchOutcome {
                        status: response.status,
                        body: response.body,
                        model: canonical,
                    });
                }
                Ok(response) => {
                    self.mark_error(account).await;
                    tracing::warn!(
                        account_id = %account.id,
                        provider = %account.provider,
                        status = response.status,
                        "upstream attempt failed"
                    );
                    last_status = Some(response.status);
                    if !should_rotate_to_next_account(response.status) {
                        self.record_failure(ctx, last_account, &canonical, last_status, started)
                            .await;
                        return Err(DispatchError::Terminal {
                            status: response.status,
                        });
                    }
                }
                Err(error) => {
                    // No upstream response arrived; always worth rotating
                    self.mark_error(account).await;
                    tracing::warn!(
                        account_id = %account.id,
                        provider = %account.provider,
                        error = %error,
                        "upstream attempt failed without a response"
                    );
                    last_status = match error {
                        TransportError::Timeout => Some(408),
                        _ => None,
                    };
                }
            }
        }

        if attempts == 0 {
            // Every candidate's credential failed to decrypt
            return Err(DispatchError::Internal(
                "no usable account credential".to_string(),
            ));
        }

        // EXHAUSTED
        self.record_failure(ctx, last_account, &canonical, last_status, started)
            .await;
        Err(DispatchError::Exhausted {
            attempts,
            last_status,
        })
    }

    fn decrypt_credentials(&self, account: &ProviderAccount) -> Option<AccountCredentials> {
        match self.vault.decrypt(&account.encrypted_credential) {
            Ok(api_key) => Some(AccountCredentials {
                api_key,
                base_url: account
                    .base_url
                    .clone()
                    .unwrap_or_else(|| account.provider.default_base_url().to_string()),
            }),
            Err(error) => {
                tracing::error!(
                    account_id = %account.id,
                    error = %error,
                    "account credential could not be decrypted; skipping account"
                );
                None
            }
        }
    }

    async fn mark_success(&self, account: &ProviderAccount) {
        if let Err(e) = self.db.accounts().mark_success(account.id, Utc::now()).await {
            tracing::warn!(account_id = %account.id, error = %e, "health update failed");
        }
    }

    async fn mark_error(&self, account: &ProviderAccount) {
        if let Err(e) = self.db.accounts().mark_error(account.id, Utc::now()).await {
            tracing::warn!(account_id = %account.id, error = %e, "health update failed");
        }
    }

    async fn record_usage(
        &self,
        ctx: &AuthContext,
        account_id: Option<Uuid>,
        model: &str,
        response: &TransportResponse,
        started: Instant,
    ) {
        self.append_record(NewUsageRecord {
            user_id: ctx.user_id,
            account_id,
            api_key_id: ctx.api_key_id,
            model: model.to_string(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            status_code: Some(response.status),
            duration_ms: started.elapsed().as_millis() as i64,
        })
        .await;
    }

    async fn record_failure(
        &self,
        ctx: &AuthContext,
        account_id: Option<Uuid>,
        model: &str,
        status_code: Option<u16>,
        started: Instant,
    ) {
        self.append_record(NewUsageRecord {
            user_id: ctx.user_id,
            account_id,
            api_key_id: ctx.api_key_id,
            model: model.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            status_code,
            duration_ms: started.elapsed().as_millis() as i64,
        })
        .await;
    }

    /// Append-only and best-effort: a usage write failure is logged and must
    /// never mask the primary outcome.
    async fn append_record(&self, record: NewUsageRecord) {
        if let Err(e) = self.db.usage().append(record).await {
            tracing::error!(error = %e, "usage record append failed");
        }
    }
}
