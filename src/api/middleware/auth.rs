//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, verifies the JWT, resolves
//! the account across the four account tables and injects
//! `AuthContext` into request extensions for downstream handlers and
//! into response extensions for the audit logger.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::find_account_by_id;

/// Require a valid bearer token for an existing, active account.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;
    let claims = ctx.core.tokens().verify(token)?;

    let account = {
        let conn = ctx.core.open_db()?;
        find_account_by_id(&conn, &claims.sub)?
    };
    let account = match account {
        Some(account) if account.is_active => account,
        Some(_) => {
            tracing::warn!(account_id = %claims.sub, "Token presented for inactive account");
            return Err(ApiError::Unauthorized);
        }
        None => {
            tracing::warn!(account_id = %claims.sub, "Token presented for unknown account");
            return Err(ApiError::Unauthorized);
        }
    };

    let auth = AuthContext::from(account);
    req.extensions_mut().insert(auth.clone());

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    // Surfaced to the audit logger, which runs outside this layer.
    response.extensions_mut().insert(auth);
    Ok(response)
}

fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
