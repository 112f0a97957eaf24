//! The OpenAI-compatible proxied surface: model listing and chat completions.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::AuthContext;
use crate::middleware::auth_middleware;
use crate::routes::error::ProxyError;

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// List the models this caller may actually use: catalog entries that pass
/// both the key-level access filter and the per-user disabled set.
async fn list_models(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Value>, ProxyError> {
    let disabled = state.db.disabled_models().list(ctx.user_id).await?;
    let snapshot = state.catalog.snapshot();

    let data: Vec<Value> = snapshot
        .models()
        .iter()
        .filter(|model| ctx.model_allowed(&model.id) && !disabled.contains(&model.id))
        .map(|model| {
            json!({
                "id": model.id,
                "object": "model",
                "owned_by": model
                    .providers
                    .first()
                    .map(|p| p.as_str())
                    .unwrap_or("unknown"),
                "display_name": model.display_name,
                "context_length": model.context_length,
                "max_output_tokens": model.max_output_tokens,
            })
        })
        .collect();

    Ok(Json(json!({"object": "list", "data": data})))
}

/// Proxy one chat completion. The upstream's successful status and body pass
/// through untouched; every failure is converted to the error envelope.
async fn chat_completions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    // Parsed by hand so malformed bodies get the envelope, not a framework
    // rejection.
    let request: Value = serde_json::from_slice(&body)
        .map_err(|_| ProxyError::invalid_request("request body must be valid JSON"))?;

    let outcome = state.engine.dispatch_chat(&ctx, request).await?;
    Response::builder()
        .status(StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::OK))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(outcome.body))
        .map_err(|_| ProxyError::internal())
}
