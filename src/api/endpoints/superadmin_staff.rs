//! Doctors and receptionists managed directly by the superadmin.
//!
//! `/api/superadmin/doctors` and `/api/superadmin/receptionists` share
//! one implementation; `StaffKind` selects the table.

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
    delete_staff, email_in_use, get_staff, insert_staff, list_staff, update_staff, StaffKind,
};
use crate::models::StaffMember;

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub designation: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub designation: Option<String>,
    pub is_active: Option<bool>,
}

type Created = (StatusCode, Json<StaffMember>);

pub async fn create_doctor(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    body: Json<CreateStaffRequest>,
) -> Result<Created, ApiError> {
    create(StaffKind::Doctor, state, auth, body).await
}

pub async fn list_doctors(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    list(StaffKind::Doctor, state, auth)
}

pub async fn get_doctor(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    detail(StaffKind::Doctor, state, auth, id)
}

pub async fn update_doctor(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
    body: Json<UpdateStaffRequest>,
) -> Result<Json<StaffMember>, ApiError> {
    update(StaffKind::Doctor, state, auth, id, body).await
}

pub async fn delete_doctor(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
) -> Result<StatusCode, ApiError> {
    remove(StaffKind::Doctor, state, auth, id)
}

pub async fn create_receptionist(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    body: Json<CreateStaffRequest>,
) -> Result<Created, ApiError> {
    create(StaffKind::Receptionist, state, auth, body).await
}

pub async fn list_receptionists(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    list(StaffKind::Receptionist, state, auth)
}

pub async fn get_receptionist(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    detail(StaffKind::Receptionist, state, auth, id)
}

pub async fn update_receptionist(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
    body: Json<UpdateStaffRequest>,
) -> Result<Json<StaffMember>, ApiError> {
    update(StaffKind::Receptionist, state, auth, id, body).await
}

pub async fn delete_receptionist(
    state: State<ApiContext>,
    auth: Extension<AuthContext>,
    id: Path<String>,
) -> Result<StatusCode, ApiError> {
    remove(StaffKind::Receptionist, state, auth, id)
}

async fn create(
    kind: StaffKind,
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateStaffRequest>,
) -> Result<Created, ApiError> {
    auth.require_superadmin()?;
    let name = required("name", body.name)?;
    let email = normalize_email(required("email", body.email)?)?;
    let password_hash = new_password_hash(required("password", body.password)?).await?;

    let conn = ctx.core.open_db()?;
    if email_in_use(&conn, &email)? {
        return Err(ApiError::Conflict(format!("Email {email} is already registered")));
    }

    let now = Utc::now();
    let member = StaffMember {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email,
        password_hash,
        phone: body.phone,
        qualification: body.qualification,
        designation: body.designation,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    insert_staff(&conn, kind, &member)?;

    tracing::info!(staff_id = %member.id, kind = kind.label(), "Superadmin staff created");
    Ok((StatusCode::CREATED, Json(member)))
}

fn list(
    kind: StaffKind,
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    auth.require_superadmin()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(list_staff(&conn, kind)?))
}

fn detail(
    kind: StaffKind,
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<StaffMember>, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load(&conn, kind, &id)?))
}

async fn update(
    kind: StaffKind,
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStaffRequest>,
) -> Result<Json<StaffMember>, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut member = load(&conn, kind, &id)?;

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
    if body.qualification.is_some() {
        member.qualification = body.qualification;
    }
    if body.designation.is_some() {
        member.designation = body.designation;
    }
    if let Some(active) = body.is_active {
        member.is_active = active;
    }
    member.updated_at = Utc::now();

    update_staff(&conn, kind, &member)?;
    Ok(Json(member))
}

fn remove(
    kind: StaffKind,
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_superadmin()?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    if !delete_staff(&conn, kind, &id)? {
        return Err(ApiError::NotFound(format!("{} not found", kind.label())));
    }
    tracing::info!(staff_id = %id, kind = kind.label(), "Superadmin staff deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn load(conn: &rusqlite::Connection, kind: StaffKind, id: &Uuid) -> Result<StaffMember, ApiError> {
    get_staff(conn, kind, id)?.ok_or_else(|| ApiError::NotFound(format!("{} not found", kind.label())))
}
