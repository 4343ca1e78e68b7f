//! Condition follow-up visits.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::patients::{load_patient, PATIENT_ROLES};
use super::prescriptions::scoped_patient;
use super::{parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_followup, get_followup, insert_followup, list_followups, update_followup,
};
use crate::models::enums::FollowUpKind;
use crate::models::FollowUp;

#[derive(Deserialize)]
pub struct CreateFollowUpRequest {
    pub patient_id: Option<Uuid>,
    pub kind: Option<FollowUpKind>,
    pub details: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateFollowUpRequest {
    pub details: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct FollowUpQuery {
    pub patient_id: Option<Uuid>,
    pub kind: Option<FollowUpKind>,
}

/// `POST /api/followups`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateFollowUpRequest>,
) -> Result<(StatusCode, Json<FollowUp>), ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let patient_id = required("patient_id", body.patient_id)?;
    let kind = required("kind", body.kind)?;
    let details = body.details.unwrap_or_else(|| serde_json::json!({}));
    if !details.is_object() {
        return Err(ApiError::BadRequest("details must be an object".into()));
    }

    let conn = ctx.core.open_db()?;
    load_patient(&conn, &auth, &patient_id)?;

    let now = Utc::now();
    let followup = FollowUp {
        id: Uuid::new_v4(),
        patient_id,
        kind,
        details,
        notes: body.notes,
        updated_by: Some(auth.account_id),
        created_at: now,
        updated_at: now,
    };
    insert_followup(&conn, &followup)?;
    Ok((StatusCode::CREATED, Json(followup)))
}

/// `GET /api/followups?patient_id=&kind=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<FollowUpQuery>,
) -> Result<Json<Vec<FollowUp>>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let conn = ctx.core.open_db()?;
    let patient_id = scoped_patient(&conn, &auth, query.patient_id)?;
    Ok(Json(list_followups(&conn, patient_id, query.kind)?))
}

/// `GET /api/followups/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<FollowUp>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load(&conn, &auth, &id)?))
}

/// `PUT /api/followups/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateFollowUpRequest>,
) -> Result<Json<FollowUp>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut followup = load(&conn, &auth, &id)?;

    if let Some(details) = body.details {
        if !details.is_object() {
            return Err(ApiError::BadRequest("details must be an object".into()));
        }
        followup.details = details;
    }
    if body.notes.is_some() {
        followup.notes = body.notes;
    }
    followup.updated_by = Some(auth.account_id);
    followup.updated_at = Utc::now();

    update_followup(&conn, &followup)?;
    Ok(Json(followup))
}

/// `DELETE /api/followups/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    load(&conn, &auth, &id)?;
    delete_followup(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn load(conn: &Connection, auth: &AuthContext, id: &Uuid) -> Result<FollowUp, ApiError> {
    let followup =
        get_followup(conn, id)?.ok_or_else(|| ApiError::NotFound("Follow-up not found".into()))?;
    load_patient(conn, auth, &followup.patient_id)?;
    Ok(followup)
}
