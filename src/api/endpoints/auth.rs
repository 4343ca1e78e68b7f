//! Login, first-superadmin bootstrap and the current-account lookup.
//!
//! `POST /api/auth/login`: email + password → bearer token
//! `POST /api/auth/bootstrap`: create the first superadmin (409 afterwards)
//! `GET  /api/auth/me`: resolved account behind the token

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{new_password_hash, normalize_email, required, verify_login_password};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    count_users_with_role, email_in_use, find_account_by_email, find_account_by_id, insert_user,
};
use crate::models::enums::Role;
use crate::models::{Account, User};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub account: Account,
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = required("email", body.email)?;
    let password = required("password", body.password)?;

    let account = {
        let conn = ctx.core.open_db()?;
        find_account_by_email(&conn, email.trim())?
    };

    // Unknown emails pay for the same derivation as known ones.
    let stored = account.as_ref().map(|a| a.password_hash.clone());
    let matched = verify_login_password(password, stored).await?;
    let account = match account {
        Some(account) if matched && account.is_active => account,
        Some(account) => {
            tracing::warn!(account_id = %account.id, "Login rejected");
            return Err(ApiError::Unauthorized);
        }
        None => return Err(ApiError::Unauthorized),
    };

    tracing::info!(account_id = %account.id, role = %account.role, "Login");
    Ok(Json(token_response(&ctx, account)?))
}

#[derive(Deserialize)]
pub struct BootstrapRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

/// `POST /api/auth/bootstrap`: only while no superadmin exists.
pub async fn bootstrap(
    State(ctx): State<ApiContext>,
    Json(body): Json<BootstrapRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let name = required("name", body.name)?;
    let email = normalize_email(required("email", body.email)?)?;
    let password = required("password", body.password)?;

    let password_hash = new_password_hash(password).await?;

    let conn = ctx.core.open_db()?;
    if count_users_with_role(&conn, Role::Superadmin)? > 0 {
        return Err(ApiError::Conflict("A superadmin already exists".into()));
    }
    if email_in_use(&conn, &email)? {
        return Err(ApiError::Conflict(format!("Email {email} is already registered")));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email,
        password_hash,
        role: Role::Superadmin,
        center_id: None,
        phone: body.phone,
        created_at: now,
        updated_at: now,
    };
    insert_user(&conn, &user)?;
    tracing::info!(account_id = %user.id, "Superadmin bootstrapped");

    let response = token_response(&ctx, Account::from(user))?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Account>, ApiError> {
    let conn = ctx.core.open_db()?;
    let account = find_account_by_id(&conn, &auth.account_id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    Ok(Json(account))
}

fn token_response(ctx: &ApiContext, account: Account) -> Result<TokenResponse, ApiError> {
    let tokens = ctx.core.tokens();
    Ok(TokenResponse {
        token: tokens.issue(&account)?,
        token_type: "Bearer",
        expires_in: tokens.ttl().num_seconds(),
        account,
    })
}
