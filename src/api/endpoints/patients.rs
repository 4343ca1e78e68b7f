//! Patient registration and records.
//!
//! Center users only see patients of their own center.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_patient, get_patient, insert_patient, list_patients, update_patient,
};
use crate::models::enums::{Gender, Role};
use crate::models::{Patient, PatientFilter, PatientTest};

/// Roles that work with patient records. Superadmin always passes.
pub(crate) const PATIENT_ROLES: &[Role] = &[Role::CenterAdmin, Role::Doctor, Role::Receptionist];

#[derive(Deserialize)]
pub struct CreatePatientRequest {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub center_id: Option<Uuid>,
    pub assigned_doctor_id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub assigned_doctor_id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub center_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct NewPatientTest {
    pub test_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub result: Option<String>,
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let name = required("name", body.name)?;
    let gender = required("gender", body.gender)?;
    let age = required("age", body.age)?;
    let phone = required("phone", body.phone)?;

    // Center users always register into their own center.
    let center_id = match auth.center_scope() {
        Some(own) => Some(own),
        None => body.center_id,
    };

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        gender,
        age,
        phone: phone.trim().to_string(),
        email: body.email,
        address: body.address,
        center_id,
        assigned_doctor_id: body.assigned_doctor_id,
        registered_by: Some(auth.account_id),
        tests: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let conn = ctx.core.open_db()?;
    insert_patient(&conn, &patient)?;

    tracing::info!(patient_id = %patient.id, by = %auth.account_id, "Patient registered");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients?search=&center_id=&doctor_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let filter = PatientFilter {
        center_id: auth.center_scope().or(query.center_id),
        doctor_id: query.doctor_id,
        search: query.search,
    };
    let conn = ctx.core.open_db()?;
    Ok(Json(list_patients(&conn, &filter)?))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load_patient(&conn, &auth, &id)?))
}

/// `PUT /api/patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut patient = load_patient(&conn, &auth, &id)?;

    if let Some(name) = body.name {
        patient.name = required("name", Some(name))?.trim().to_string();
    }
    if let Some(gender) = body.gender {
        patient.gender = gender;
    }
    if let Some(age) = body.age {
        patient.age = age;
    }
    if let Some(phone) = body.phone {
        patient.phone = required("phone", Some(phone))?.trim().to_string();
    }
    if body.email.is_some() {
        patient.email = body.email;
    }
    if body.address.is_some() {
        patient.address = body.address;
    }
    if body.assigned_doctor_id.is_some() {
        patient.assigned_doctor_id = body.assigned_doctor_id;
    }
    patient.updated_at = Utc::now();

    update_patient(&conn, &patient)?;
    Ok(Json(patient))
}

/// `DELETE /api/patients/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(&[Role::CenterAdmin, Role::Receptionist])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    load_patient(&conn, &auth, &id)?;
    delete_patient(&conn, &id)?;
    tracing::info!(patient_id = %id, "Patient deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/patients/:id/tests`: append to the embedded test list.
pub async fn add_test(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<NewPatientTest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    auth.require_role(PATIENT_ROLES)?;
    let test_name = required("test_name", body.test_name)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut patient = load_patient(&conn, &auth, &id)?;

    let now = Utc::now();
    patient.tests.push(PatientTest {
        test_name: test_name.trim().to_string(),
        date: body.date.unwrap_or_else(|| now.date_naive()),
        result: body.result,
        recorded_by: Some(auth.account_id),
    });
    patient.updated_at = now;

    update_patient(&conn, &patient)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// Load a patient the caller may access: 404 when missing, 403 when it
/// belongs to another center.
pub(crate) fn load_patient(
    conn: &Connection,
    auth: &AuthContext,
    id: &Uuid,
) -> Result<Patient, ApiError> {
    let patient =
        get_patient(conn, id)?.ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    auth.ensure_center_access(patient.center_id)?;
    Ok(patient)
}
