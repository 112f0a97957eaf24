//! Request middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::auth::Credential;
use crate::routes::error::ProxyError;

/// Authenticate every request on the proxied and management surfaces and
/// stash the [`crate::auth::AuthContext`] in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let credential =
        Credential::from_headers(request.headers(), &state.config.auth.session_cookie);
    match state.authenticator.authenticate(credential).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => ProxyError::from(err).into_response(),
    }
}
