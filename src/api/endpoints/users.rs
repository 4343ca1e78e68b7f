//! Center staff accounts (center admins, doctors, receptionists).
//!
//! Superadmin manages every center; a center admin manages the doctors
//! and receptionists of its own center.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{new_password_hash, normalize_email, parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_user, email_in_use, get_center, get_user, insert_user, list_users, update_user,
};
use crate::models::enums::Role;
use crate::models::{User, UserFilter};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub center_id: Option<Uuid>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub center_id: Option<Uuid>,
}

/// Roles a caller may assign when creating an account.
fn assignable_roles(auth: &AuthContext) -> &'static [Role] {
    if auth.is_superadmin() {
        &[Role::CenterAdmin, Role::Doctor, Role::Receptionist]
    } else {
        &[Role::Doctor, Role::Receptionist]
    }
}

/// `POST /api/users`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let name = required("name", body.name)?;
    let email = normalize_email(required("email", body.email)?)?;
    let password = required("password", body.password)?;
    let role = required("role", body.role)?;
    if !assignable_roles(&auth).contains(&role) {
        return Err(ApiError::Forbidden(format!("Cannot create {role} accounts")));
    }

    let center_id = match auth.center_scope() {
        Some(own) => own,
        None => required("center_id", body.center_id)?,
    };

    let password_hash = new_password_hash(password).await?;

    let conn = ctx.core.open_db()?;
    if get_center(&conn, &center_id)?.is_none() {
        return Err(ApiError::NotFound("Center not found".into()));
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
        role,
        center_id: Some(center_id),
        phone: body.phone,
        created_at: now,
        updated_at: now,
    };
    insert_user(&conn, &user)?;

    tracing::info!(user_id = %user.id, role = %user.role, center_id = %center_id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users?role=&center_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let filter = UserFilter {
        role: query.role,
        center_id: auth.center_scope().or(query.center_id),
    };
    let conn = ctx.core.open_db()?;
    Ok(Json(list_users(&conn, &filter)?))
}

/// `GET /api/users/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let user = load_user(&conn, &auth, &id)?;
    Ok(Json(user))
}

/// `PUT /api/users/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut user = load_user(&conn, &auth, &id)?;

    if let Some(name) = body.name {
        user.name = required("name", Some(name))?.trim().to_string();
    }
    if let Some(email) = body.email {
        let email = normalize_email(email)?;
        if email != user.email && email_in_use(&conn, &email)? {
            return Err(ApiError::Conflict(format!("Email {email} is already registered")));
        }
        user.email = email;
    }
    if let Some(password) = body.password {
        user.password_hash = new_password_hash(password).await?;
    }
    if body.phone.is_some() {
        user.phone = body.phone;
    }
    user.updated_at = Utc::now();

    update_user(&conn, &user)?;
    Ok(Json(user))
}

/// `DELETE /api/users/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let user = load_user(&conn, &auth, &id)?;
    if user.id == auth.account_id {
        return Err(ApiError::Conflict("Cannot delete your own account".into()));
    }
    delete_user(&conn, &id)?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Load a user the caller may manage. Center admins cannot touch the
/// superadmin or accounts of other centers.
fn load_user(
    conn: &rusqlite::Connection,
    auth: &AuthContext,
    id: &Uuid,
) -> Result<User, ApiError> {
    let user = get_user(conn, id)?.ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    if !auth.is_superadmin() {
        if user.role == Role::Superadmin {
            return Err(ApiError::Forbidden("Cannot manage the superadmin".into()));
        }
        auth.ensure_center_access(user.center_id)?;
    }
    Ok(user)
}
