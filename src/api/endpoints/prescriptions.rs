//! Prescriptions with their medication lines.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::patients::{load_patient, PATIENT_ROLES};
use super::{parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_prescription, get_prescription, insert_prescription, list_prescriptions,
    update_prescription,
};
use crate::models::enums::Role;
use crate::models::{Medication, Prescription};

const PRESCRIBERS: &[Role] = &[Role::Doctor, Role::CenterAdmin];

#[derive(Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Option<Uuid>,
    pub visit: Option<String>,
    pub notes: Option<String>,
    pub medications: Option<Vec<Medication>>,
}

#[derive(Deserialize, Default)]
pub struct UpdatePrescriptionRequest {
    pub visit: Option<String>,
    pub notes: Option<String>,
    pub medications: Option<Vec<Medication>>,
}

#[derive(Deserialize, Default)]
pub struct PatientScopedQuery {
    pub patient_id: Option<Uuid>,
}

/// `POST /api/prescriptions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    auth.require_role(PRESCRIBERS)?;
    let patient_id = required("patient_id", body.patient_id)?;
    let medications = required("medications", body.medications)?;
    validate_medications(&medications)?;

    let conn = ctx.core.open_db()?;
    load_patient(&conn, &auth, &patient_id)?;

    let now = Utc::now();
    let rx = Prescription {
        id: Uuid::new_v4(),
        patient_id,
        visit: body.visit,
        notes: body.notes,
        medications,
        prescribed_by: Some(auth.account_id),
        updated_by: Some(auth.account_id),
        created_at: now,
        updated_at: now,
    };
    insert_prescription(&conn, &rx)?;

    tracing::info!(prescription_id = %rx.id, patient_id = %patient_id, "Prescription created");
    Ok((StatusCode::CREATED, Json(rx)))
}

/// `GET /api/prescriptions?patient_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientScopedQuery>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let conn = ctx.core.open_db()?;
    let patient_id = scoped_patient(&conn, &auth, query.patient_id)?;
    Ok(Json(list_prescriptions(&conn, patient_id.as_ref())?))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Prescription>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load(&conn, &auth, &id)?))
}

/// `PUT /api/prescriptions/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Prescription>, ApiError> {
    auth.require_role(PRESCRIBERS)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut rx = load(&conn, &auth, &id)?;

    if body.visit.is_some() {
        rx.visit = body.visit;
    }
    if body.notes.is_some() {
        rx.notes = body.notes;
    }
    if let Some(medications) = body.medications {
        let medications = required("medications", Some(medications))?;
        validate_medications(&medications)?;
        rx.medications = medications;
    }
    rx.updated_by = Some(auth.account_id);
    rx.updated_at = Utc::now();

    update_prescription(&conn, &rx)?;
    Ok(Json(rx))
}

/// `DELETE /api/prescriptions/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(PRESCRIBERS)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    load(&conn, &auth, &id)?;
    delete_prescription(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_medications(medications: &[Medication]) -> Result<(), ApiError> {
    for (i, med) in medications.iter().enumerate() {
        if med.drug_name.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "medications[{i}].drug_name is required"
            )));
        }
    }
    Ok(())
}

fn load(conn: &Connection, auth: &AuthContext, id: &Uuid) -> Result<Prescription, ApiError> {
    let rx = get_prescription(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Prescription not found".into()))?;
    load_patient(conn, auth, &rx.patient_id)?;
    Ok(rx)
}

/// Resolve the `patient_id` filter of a clinical-record list. Callers
/// limited to one center must name a patient they can access.
pub(crate) fn scoped_patient(
    conn: &Connection,
    auth: &AuthContext,
    patient_id: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    match patient_id {
        Some(pid) => {
            load_patient(conn, auth, &pid)?;
            Ok(Some(pid))
        }
        None if auth.has_global_scope() => Ok(None),
        None => Err(ApiError::BadRequest("patient_id is required".into())),
    }
}
