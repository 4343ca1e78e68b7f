//! Center management (superadmin).
//!
//! A center may be created together with its center admin. Deleting a
//! center also deletes that admin account.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{new_password_hash, normalize_email, parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_center, delete_user, email_in_use, get_center, get_user, insert_center, insert_user,
    list_centers, update_center,
};
use crate::models::enums::Role;
use crate::models::{Center, User};

#[derive(Deserialize)]
pub struct CenterAdminInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCenterRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub admin: Option<CenterAdminInput>,
}

#[derive(Deserialize, Default)]
pub struct UpdateCenterRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct CenterView {
    #[serde(flatten)]
    pub center: Center,
    pub admin: Option<User>,
}

/// `POST /api/centers`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateCenterRequest>,
) -> Result<(StatusCode, Json<CenterView>), ApiError> {
    auth.require_superadmin()?;
    let name = required("name", body.name)?;
    let code = required("code", body.code)?;

    let now = Utc::now();
    let mut center = Center {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        code: code.trim().to_string(),
        address: body.address,
        phone: body.phone,
        email: body.email,
        center_admin_id: None,
        created_at: now,
        updated_at: now,
    };

    let admin = match body.admin {
        Some(input) => {
            let email = normalize_email(required("admin.email", input.email)?)?;
            Some(User {
                id: Uuid::new_v4(),
                name: required("admin.name", input.name)?.trim().to_string(),
                password_hash: new_password_hash(required("admin.password", input.password)?)
                    .await?,
                email,
                role: Role::CenterAdmin,
                center_id: Some(center.id),
                phone: input.phone,
                created_at: now,
                updated_at: now,
            })
        }
        None => None,
    };
    center.center_admin_id = admin.as_ref().map(|a| a.id);

    let conn = ctx.core.open_db()?;
    if let Some(admin) = &admin {
        if email_in_use(&conn, &admin.email)? {
            return Err(ApiError::Conflict(format!(
                "Email {} is already registered",
                admin.email
            )));
        }
    }

    let tx = conn.unchecked_transaction()?;
    insert_center(&tx, &center)?;
    if let Some(admin) = &admin {
        insert_user(&tx, admin)?;
    }
    tx.commit()?;

    tracing::info!(center_id = %center.id, code = %center.code, "Center created");
    Ok((StatusCode::CREATED, Json(CenterView { center, admin })))
}

/// `GET /api/centers`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Center>>, ApiError> {
    auth.require_superadmin()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(list_centers(&conn)?))
}

/// `GET /api/centers/:id`: superadmin, or the center's own staff.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<CenterView>, ApiError> {
    let id = parse_id(&id)?;
    auth.ensure_center_access(Some(id))?;
    let conn = ctx.core.open_db()?;
    let center = load_center(&conn, &id)?;
    let admin = match center.center_admin_id {
        Some(admin_id) => get_user(&conn, &admin_id)?,
        None => None,
    };
    Ok(Json(CenterView { center, admin }))
}

/// `PUT /api/centers/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCenterRequest>,
) -> Result<Json<Center>, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut center = load_center(&conn, &id)?;

    if let Some(name) = body.name {
        center.name = required("name", Some(name))?.trim().to_string();
    }
    if let Some(code) = body.code {
        center.code = required("code", Some(code))?.trim().to_string();
    }
    if body.address.is_some() {
        center.address = body.address;
    }
    if body.phone.is_some() {
        center.phone = body.phone;
    }
    if body.email.is_some() {
        center.email = body.email;
    }
    center.updated_at = Utc::now();

    update_center(&conn, &center)?;
    Ok(Json(center))
}

/// `DELETE /api/centers/:id`: removes the center, then its admin.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let center = load_center(&conn, &id)?;

    delete_center(&conn, &id)?;
    if let Some(admin_id) = center.center_admin_id {
        delete_user(&conn, &admin_id)?;
    }

    tracing::info!(center_id = %id, "Center deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn load_center(conn: &rusqlite::Connection, id: &Uuid) -> Result<Center, ApiError> {
    get_center(conn, id)?.ok_or_else(|| ApiError::NotFound("Center not found".into()))
}
