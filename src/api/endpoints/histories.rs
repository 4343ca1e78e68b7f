//! Patient clinical histories.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::patients::{load_patient, PATIENT_ROLES};
use super::prescriptions::{scoped_patient, PatientScopedQuery};
use super::{parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_history, get_history, insert_history, list_histories, update_history,
};
use crate::models::History;

#[derive(Deserialize, Default)]
pub struct HistoryFields {
    pub chief_complaint: Option<String>,
    pub present_illness: Option<String>,
    pub past_history: Option<String>,
    pub family_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateHistoryRequest {
    pub patient_id: Option<Uuid>,
    #[serde(flatten)]
    pub fields: HistoryFields,
}

/// `POST /api/histories`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateHistoryRequest>,
) -> Result<(StatusCode, Json<History>), ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let patient_id = required("patient_id", body.patient_id)?;

    let conn = ctx.core.open_db()?;
    load_patient(&conn, &auth, &patient_id)?;

    let now = Utc::now();
    let f = body.fields;
    let history = History {
        id: Uuid::new_v4(),
        patient_id,
        chief_complaint: f.chief_complaint,
        present_illness: f.present_illness,
        past_history: f.past_history,
        family_history: f.family_history,
        allergies: f.allergies,
        current_medications: f.current_medications,
        notes: f.notes,
        updated_by: Some(auth.account_id),
        created_at: now,
        updated_at: now,
    };
    insert_history(&conn, &history)?;
    Ok((StatusCode::CREATED, Json(history)))
}

/// `GET /api/histories?patient_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientScopedQuery>,
) -> Result<Json<Vec<History>>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let conn = ctx.core.open_db()?;
    let patient_id = scoped_patient(&conn, &auth, query.patient_id)?;
    Ok(Json(list_histories(&conn, patient_id.as_ref())?))
}

/// `GET /api/histories/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<History>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load(&conn, &auth, &id)?))
}

/// `PUT /api/histories/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(f): Json<HistoryFields>,
) -> Result<Json<History>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut history = load(&conn, &auth, &id)?;

    if f.chief_complaint.is_some() {
        history.chief_complaint = f.chief_complaint;
    }
    if f.present_illness.is_some() {
        history.present_illness = f.present_illness;
    }
    if f.past_history.is_some() {
        history.past_history = f.past_history;
    }
    if f.family_history.is_some() {
        history.family_history = f.family_history;
    }
    if f.allergies.is_some() {
        history.allergies = f.allergies;
    }
    if f.current_medications.is_some() {
        history.current_medications = f.current_medications;
    }
    if f.notes.is_some() {
        history.notes = f.notes;
    }
    history.updated_by = Some(auth.account_id);
    history.updated_at = Utc::now();

    update_history(&conn, &history)?;
    Ok(Json(history))
}

/// `DELETE /api/histories/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    load(&conn, &auth, &id)?;
    delete_history(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn load(conn: &Connection, auth: &AuthContext, id: &Uuid) -> Result<History, ApiError> {
    let history =
        get_history(conn, id)?.ok_or_else(|| ApiError::NotFound("History not found".into()))?;
    load_patient(conn, auth, &history.patient_id)?;
    Ok(history)
}
