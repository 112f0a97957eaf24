//! The management surface: provider accounts, API keys, usage, and the
//! per-user disabled-model set. Every operation is scoped to the
//! authenticated user.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, put};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::accounts::{HealthIndicator, health_indicator};
use crate::auth::AuthContext;
use crate::middleware::auth_middleware;
use crate::models::api_key_gen::{generate_api_key, hash_api_key};
use crate::models::{
    ApiKey, ModelAccessMode, NewApiKey, NewProviderAccount, ProviderAccount,
    ProviderAccountUpdate, ProviderKind, UsageAggregate, UsageGroupBy,
};
use crate::routes::error::ProxyError;

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/accounts", get(list_accounts).post(create_account))
        .route(
            "/admin/accounts/{id}",
            delete(delete_account).patch(update_account),
        )
        .route("/admin/keys", get(list_keys).post(create_key))
        .route("/admin/keys/{id}", delete(revoke_key))
        .route("/admin/usage", get(usage_summary))
        .route("/admin/disabled-models", get(list_disabled_models))
        .route(
            "/admin/disabled-models/{model_id}",
            put(disable_model).delete(enable_model),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// An account as shown to its owner: the stored row (credential ciphertext
/// excluded by serialization) plus the derived health indicator.
#[derive(Debug, Serialize)]
struct AccountView {
    #[serde(flatten)]
    account: ProviderAccount,
    health: HealthIndicator,
}

impl AccountView {
    fn new(account: ProviderAccount, now: DateTime<Utc>) -> Self {
        let health = health_indicator(account.last_error_at, account.last_success_at, now);
        Self { account, health }
    }
}

async fn list_accounts(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<AccountView>>, ProxyError> {
    let now = Utc::now();
    let accounts = state.db.accounts().list(ctx.user_id).await?;
    Ok(Json(
        accounts
            .into_iter()
            .map(|account| AccountView::new(account, now))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateAccountRequest {
    provider: ProviderKind,
    label: String,
    /// Plaintext upstream API key; encrypted before it reaches storage.
    credential: String,
    #[serde(default)]
    base_url: Option<String>,
}

async fn create_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), ProxyError> {
    if req.label.trim().is_empty() {
        return Err(ProxyError::invalid_request("label must not be empty"));
    }
    if req.credential.is_empty() {
        return Err(ProxyError::invalid_request("credential must not be empty"));
    }

    let encrypted_credential = encrypt_or_internal(&state, &req.credential)?;
    let account = state
        .db
        .accounts()
        .create(NewProviderAccount {
            user_id: ctx.user_id,
            provider: req.provider,
            label: req.label,
            encrypted_credential,
            base_url: req.base_url,
        })
        .await?;
    tracing::info!(account_id = %account.id, provider = %account.provider, "account linked");

    Ok((
        StatusCode::CREATED,
        Json(AccountView::new(account, Utc::now())),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateAccountRequest {
    label: Option<String>,
    is_active: Option<bool>,
    /// Absent leaves the override alone; an explicit null clears it.
    #[serde(default, with = "double_option")]
    base_url: Option<Option<String>>,
    /// Replacement plaintext credential.
    credential: Option<String>,
}

/// Distinguishes a missing field from an explicit null.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

async fn update_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountView>, ProxyError> {
    if let Some(label) = &req.label
        && label.trim().is_empty()
    {
        return Err(ProxyError::invalid_request("label must not be empty"));
    }

    let encrypted_credential = match &req.credential {
        Some(credential) if credential.is_empty() => {
            return Err(ProxyError::invalid_request("credential must not be empty"));
        }
        Some(credential) => Some(encrypt_or_internal(&state, credential)?),
        None => None,
    };

    let account = state
        .db
        .accounts()
        .update(
            ctx.user_id,
            id,
            ProviderAccountUpdate {
                label: req.label,
                is_active: req.is_active,
                base_url: req.base_url,
                encrypted_credential,
            },
        )
        .await?;
    Ok(Json(AccountView::new(account, Utc::now())))
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProxyError> {
    state.db.accounts().delete(ctx.user_id, id).await?;
    tracing::info!(account_id = %id, "account unlinked");
    Ok(StatusCode::NO_CONTENT)
}

fn encrypt_or_internal(state: &AppState, plaintext: &str) -> Result<String, ProxyError> {
    state.vault.encrypt(plaintext).map_err(|e| {
        tracing::error!(error = %e, "credential encryption failed");
        ProxyError::internal()
    })
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKey>>, ProxyError> {
    Ok(Json(state.db.api_keys().list(ctx.user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateKeyRequest {
    name: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    model_access_mode: ModelAccessMode,
    #[serde(default)]
    model_access_list: Vec<String>,
}

/// The one response that ever carries a key's plaintext.
#[derive(Debug, Serialize)]
struct CreatedKeyResponse {
    key: String,
    #[serde(flatten)]
    record: ApiKey,
}

async fn create_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreatedKeyResponse>), ProxyError> {
    if req.name.trim().is_empty() {
        return Err(ProxyError::invalid_request("name must not be empty"));
    }
    if let Some(expires_at) = req.expires_at
        && expires_at <= Utc::now()
    {
        return Err(ProxyError::invalid_request("expires_at is in the past"));
    }

    let (key, key_prefix) = generate_api_key();
    let record = state
        .db
        .api_keys()
        .create(NewApiKey {
            user_id: ctx.user_id,
            name: req.name,
            key_prefix,
            key_hash: hash_api_key(&key),
            encrypted_key: encrypt_or_internal(&state, &key)?,
            expires_at: req.expires_at,
            model_access_mode: req.model_access_mode,
            model_access_list: req.model_access_list,
        })
        .await?;
    tracing::info!(key_id = %record.id, "API key issued");

    Ok((StatusCode::CREATED, Json(CreatedKeyResponse { key, record })))
}

async fn revoke_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProxyError> {
    state.db.api_keys().revoke(ctx.user_id, id).await?;
    tracing::info!(key_id = %id, "API key revoked");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct UsageQuery {
    group_by: Option<String>,
}

#[derive(Debug, Serialize)]
struct UsageSummaryResponse {
    group_by: UsageGroupBy,
    buckets: Vec<UsageAggregate>,
}

async fn usage_summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageSummaryResponse>, ProxyError> {
    let group_by = match query.group_by.as_deref() {
        None => UsageGroupBy::Model,
        Some(raw) => UsageGroupBy::parse(raw).ok_or_else(|| {
            ProxyError::invalid_request(format!("unknown group_by: {raw}"))
        })?,
    };
    let buckets = state.db.usage().aggregate(ctx.user_id, group_by).await?;
    Ok(Json(UsageSummaryResponse { group_by, buckets }))
}

async fn list_disabled_models(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<String>>, ProxyError> {
    let mut disabled: Vec<String> = state
        .db
        .disabled_models()
        .list(ctx.user_id)
        .await?
        .into_iter()
        .collect();
    disabled.sort_unstable();
    Ok(Json(disabled))
}

/// Idempotent; aliases are accepted and stored under the canonical id.
async fn disable_model(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(model_id): Path<String>,
) -> Result<StatusCode, ProxyError> {
    let canonical = resolve_known_model(&state, &model_id)?;
    state
        .db
        .disabled_models()
        .disable(ctx.user_id, &canonical)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable_model(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(model_id): Path<String>,
) -> Result<StatusCode, ProxyError> {
    let canonical = resolve_known_model(&state, &model_id)?;
    state
        .db
        .disabled_models()
        .enable(ctx.user_id, &canonical)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn resolve_known_model(state: &AppState, model_id: &str) -> Result<String, ProxyError> {
    let snapshot = state.catalog.snapshot();
    let canonical = snapshot.resolve_alias(model_id);
    if snapshot.get(canonical).is_none() {
        return Err(ProxyError::invalid_request(format!(
            "unknown model: {model_id}"
        )));
    }
    Ok(canonical.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::models::ProviderKind;
    use crate::routes::testing::*;
    use crate::transport::testing::ScriptedOutcome;

    #[tokio::test]
    async fn test_admin_requires_auth() {
        let (app, _, _) = test_app(vec![]).await;
        let (status, body) = get_json(&app, "/admin/accounts", None).await;
        assert_eq!(status, 401);
        assert_eq!(body["error"]["type"], "authentication_error");
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        let (status, created) = post_json(
            &app,
            "/admin/accounts",
            Some(&key),
            json!({
                "provider": "openai",
                "label": "work account",
                "credential": "sk-upstream-secret",
            }),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(created["provider"], "openai");
        assert_eq!(created["label"], "work account");
        assert_eq!(created["health"], "normal");
        assert_eq!(created["is_active"], true);
        // The credential never comes back in any form
        assert!(created.get("encrypted_credential").is_none());
        assert!(created.get("credential").is_none());
        let id = created["id"].as_str().unwrap().to_string();

        let (status, listed) = get_json(&app, "/admin/accounts", Some(&key)).await;
        assert_eq!(status, 200);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, updated) = request(
            &app,
            "PATCH",
            &format!("/admin/accounts/{id}"),
            Some(&key),
            Some(json!({"is_active": false, "label": "paused"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(updated["is_active"], false);
        assert_eq!(updated["label"], "paused");

        let (status, _) = delete_json(&app, &format!("/admin/accounts/{id}"), Some(&key)).await;
        assert_eq!(status, 204);
        let (_, listed) = get_json(&app, "/admin/accounts", Some(&key)).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_patch_base_url_null_clears_override() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        let (_, created) = post_json(
            &app,
            "/admin/accounts",
            Some(&key),
            json!({
                "provider": "openai",
                "label": "regional",
                "credential": "sk-x",
                "base_url": "https://eu.gateway.example/v1",
            }),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        assert_eq!(created["base_url"], "https://eu.gateway.example/v1");

        // Untouched when the field is absent
        let (_, updated) = request(
            &app,
            "PATCH",
            &format!("/admin/accounts/{id}"),
            Some(&key),
            Some(json!({"label": "still regional"})),
        )
        .await;
        assert_eq!(updated["base_url"], "https://eu.gateway.example/v1");

        let (_, updated) = request(
            &app,
            "PATCH",
            &format!("/admin/accounts/{id}"),
            Some(&key),
            Some(json!({"base_url": null})),
        )
        .await;
        assert_eq!(updated["base_url"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_accounts_are_user_scoped() {
        let (app, state, _) = test_app(vec![]).await;
        let (owner_id, owner_key) = seed_user_with_key(&state).await;
        let (_, intruder_key) = seed_user_with_key(&state).await;
        let account_id =
            add_account(&state, owner_id, ProviderKind::OpenAi, "sk-owner").await;

        let (status, listed) = get_json(&app, "/admin/accounts", Some(&intruder_key)).await;
        assert_eq!(status, 200);
        assert!(listed.as_array().unwrap().is_empty());

        let (status, _) = delete_json(
            &app,
            &format!("/admin/accounts/{account_id}"),
            Some(&intruder_key),
        )
        .await;
        assert_eq!(status, 404);

        // Still there for the owner
        let (_, listed) = get_json(&app, "/admin/accounts", Some(&owner_key)).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_account_rejects_blank_fields() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        let (status, body) = post_json(
            &app,
            "/admin/accounts",
            Some(&key),
            json!({"provider": "openai", "label": "  ", "credential": "sk-x"}),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["type"], "invalid_request_error");

        let (status, _) = post_json(
            &app,
            "/admin/accounts",
            Some(&key),
            json!({"provider": "openai", "label": "ok", "credential": ""}),
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_key_issued_once_then_usable() {
        let (app, state, _) = test_app(vec![ScriptedOutcome::Status(200)]).await;
        let (user_id, bootstrap_key) = seed_user_with_key(&state).await;
        add_account(&state, user_id, ProviderKind::OpenAi, "sk-upstream").await;

        let (status, created) = post_json(
            &app,
            "/admin/keys",
            Some(&bootstrap_key),
            json!({"name": "ci key"}),
        )
        .await;
        assert_eq!(status, 201);
        let issued = created["key"].as_str().unwrap().to_string();
        assert!(issued.starts_with("gk_live_"));
        assert!(created.get("key_hash").is_none());
        assert!(created.get("encrypted_key").is_none());

        // Listing shows the record but never the plaintext
        let (_, listed) = get_json(&app, "/admin/keys", Some(&bootstrap_key)).await;
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"ci key"));
        assert!(listed.as_array().unwrap().iter().all(|k| k.get("key").is_none()));

        // The issued key authenticates a proxied request
        let (status, _) = post_json(
            &app,
            "/v1/chat/completions",
            Some(&issued),
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_revoked_key_stops_authenticating() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, bootstrap_key) = seed_user_with_key(&state).await;

        let (_, created) = post_json(
            &app,
            "/admin/keys",
            Some(&bootstrap_key),
            json!({"name": "short lived"}),
        )
        .await;
        let issued = created["key"].as_str().unwrap().to_string();
        let id = created["id"].as_str().unwrap();

        let (status, _) = get_json(&app, "/v1/models", Some(&issued)).await;
        assert_eq!(status, 200);

        let (status, _) =
            delete_json(&app, &format!("/admin/keys/{id}"), Some(&bootstrap_key)).await;
        assert_eq!(status, 204);

        let (status, body) = get_json(&app, "/v1/models", Some(&issued)).await;
        assert_eq!(status, 401);
        assert_eq!(body["error"]["message"], "API key has been revoked");
    }

    #[tokio::test]
    async fn test_create_key_rejects_past_expiry() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        let (status, _) = post_json(
            &app,
            "/admin/keys",
            Some(&key),
            json!({"name": "stale", "expires_at": "2020-01-01T00:00:00Z"}),
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_usage_summary_groups_by_model() {
        let (app, state, _) = test_app(vec![
            ScriptedOutcome::Status(200),
            ScriptedOutcome::Status(200),
        ])
        .await;
        let (user_id, key) = seed_user_with_key(&state).await;
        add_account(&state, user_id, ProviderKind::OpenAi, "sk-upstream").await;

        for _ in 0..2 {
            let (status, _) = post_json(
                &app,
                "/v1/chat/completions",
                Some(&key),
                json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]}),
            )
            .await;
            assert_eq!(status, 200);
        }

        let (status, body) = get_json(&app, "/admin/usage?group_by=model", Some(&key)).await;
        assert_eq!(status, 200);
        assert_eq!(body["group_by"], "model");
        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["key"], "gpt-4o");
        assert_eq!(buckets[0]["request_count"], 2);
        assert_eq!(buckets[0]["success_count"], 2);

        let (status, body) = get_json(&app, "/admin/usage?group_by=nope", Some(&key)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_disabled_models_round_trip() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        // Disable through an alias; stored under the canonical id
        let (status, _) = request(
            &app,
            "PUT",
            "/admin/disabled-models/claude-sonnet-4-5-20250929",
            Some(&key),
            None,
        )
        .await;
        assert_eq!(status, 204);
        // Repeat is a no-op, not an error
        let (status, _) = request(
            &app,
            "PUT",
            "/admin/disabled-models/claude-sonnet-4-5",
            Some(&key),
            None,
        )
        .await;
        assert_eq!(status, 204);

        let (_, listed) = get_json(&app, "/admin/disabled-models", Some(&key)).await;
        assert_eq!(listed, json!(["claude-sonnet-4-5"]));

        let (_, models) = get_json(&app, "/v1/models", Some(&key)).await;
        let ids: Vec<&str> = models["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert!(!ids.contains(&"claude-sonnet-4-5"));

        let (status, _) = delete_json(&app, "/admin/disabled-models/claude-sonnet-4-5", Some(&key))
            .await;
        assert_eq!(status, 204);
        let (_, listed) = get_json(&app, "/admin/disabled-models", Some(&key)).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_disable_unknown_model_rejected() {
        let (app, state, _) = test_app(vec![]).await;
        let (_, key) = seed_user_with_key(&state).await;

        let (status, body) = request(
            &app,
            "PUT",
            "/admin/disabled-models/no-such-model",
            Some(&key),
            None,
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }
}
