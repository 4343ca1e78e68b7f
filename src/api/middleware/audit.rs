//! Audit logging middleware.
//!
//! Logs every API request with account_id, method, path, response
//! status and latency. Runs outside auth, so rejected tokens are logged
//! as anonymous; the account id is read from the response extensions
//! that auth fills in.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let started = Instant::now();
    let response = next.run(req).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let account_id = response
        .extensions()
        .get::<AuthContext>()
        .map(|a| a.account_id.to_string())
        .unwrap_or_else(|| "anonymous".into());

    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, %account_id, latency_ms, "API request failed");
    } else {
        tracing::info!(%method, %path, status, %account_id, latency_ms, "API request");
    }

    response
}
