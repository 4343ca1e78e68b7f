//! Lab staff accounts (superadmin).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{new_password_hash, normalize_email, parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_lab_staff, email_in_use, get_lab_staff, insert_lab_staff, list_lab_staff,
    update_lab_staff,
};
use crate::models::enums::Role;
use crate::models::LabStaffMember;

#[derive(Deserialize)]
pub struct CreateLabStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub lab_name: Option<String>,
    pub designation: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateLabStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub lab_name: Option<String>,
    pub designation: Option<String>,
    pub is_active: Option<bool>,
}

/// `POST /api/lab-staff`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateLabStaffRequest>,
) -> Result<(StatusCode, Json<LabStaffMember>), ApiError> {
    auth.require_superadmin()?;
    let name = required("name", body.name)?;
    let email = normalize_email(required("email", body.email)?)?;
    let password_hash = new_password_hash(required("password", body.password)?).await?;

    let conn = ctx.core.open_db()?;
    if email_in_use(&conn, &email)? {
        return Err(ApiError::Conflict(format!("Email {email} is already registered")));
    }

    let now = Utc::now();
    let member = LabStaffMember {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email,
        password_hash,
        phone: body.phone,
        lab_name: body.lab_name,
        designation: body.designation,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    insert_lab_staff(&conn, &member)?;

    tracing::info!(lab_staff_id = %member.id, "Lab staff created");
    Ok((StatusCode::CREATED, Json(member)))
}

/// `GET /api/lab-staff`: superadmin and center staff picking an assignee.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<LabStaffMember>>, ApiError> {
    auth.require_role(&[Role::CenterAdmin, Role::Receptionist])?;
    let conn = ctx.core.open_db()?;
    Ok(Json(list_lab_staff(&conn)?))
}

/// `GET /api/lab-staff/:id`: superadmin, or the member themself.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<LabStaffMember>, ApiError> {
    let id = parse_id(&id)?;
    if auth.account_id != id {
        auth.require_superadmin()?;
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(load(&conn, &id)?))
}

/// `PUT /api/lab-staff/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateLabStaffRequest>,
) -> Result<Json<LabStaffMember>, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut member = load(&conn, &id)?;

    if let Some(name) = body.name {
        member.name = required("name", Some(name))?.trim().to_string();
    }
    if let Some(email) = body.email {
        let email = normalize_email(email)?;
        if email != member.email && email_in_use(&conn, &email)? {
            return Err(ApiError::Conflict(format!("Email {email} is already registered")));
        }
        member.email = email;
    }
    if let Some(password) = body.password {
        member.password_hash = new_password_hash(password).await?;
    }
    if body.phone.is_some() {
        member.phone = body.phone;
    }
    if body.lab_name.is_some() {
        member.lab_name = body.lab_name;
    }
    if body.designation.is_some() {
        member.designation = body.designation;
    }
    if let Some(active) = body.is_active {
        member.is_active = active;
    }
    member.updated_at = Utc::now();

    update_lab_staff(&conn, &member)?;
    Ok(Json(member))
}

/// `DELETE /api/lab-staff/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    if !delete_lab_staff(&conn, &id)? {
        return Err(ApiError::NotFound("Lab staff not found".into()));
    }
    tracing::info!(lab_staff_id = %id, "Lab staff deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn load(conn: &rusqlite::Connection, id: &Uuid) -> Result<LabStaffMember, ApiError> {
    get_lab_staff(conn, id)?.ok_or_else(|| ApiError::NotFound("Lab staff not found".into()))
}
