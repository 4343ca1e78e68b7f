//! Lab test requests: CRUD, workflow steps, billing and report download.
//!
//! Every workflow step loads the request, checks the caller, applies the
//! step through `crate::workflow` and saves it as a compare-and-set on the
//! status it was loaded in. Workflow saves never touch billing columns and
//! billing saves never touch workflow columns. A lost race is a 409.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::patients::load_patient;
use super::{parse_id, required};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::db::repository::{
    delete_test_request, find_account_by_id, get_center, get_lab_staff, get_patient,
    get_test_request, insert_test_request, list_test_requests, save_billing,
    save_workflow_step, update_test_request_details,
};
use crate::models::enums::{Role, TestRequestStatus, Urgency};
use crate::models::{
    Billing, BillingItem, CollectionSchedule, TestRequest, TestRequestFilter, TestResults,
};
use crate::report::{self, ReportContext};
use crate::workflow::{self, WorkflowError};

/// Front desk: assignment, billing, report delivery.
const FRONT_DESK: &[Role] = &[Role::CenterAdmin, Role::Receptionist];
/// Lab bench: collection, testing, report generation.
const LAB_BENCH: &[Role] = &[Role::CenterAdmin, Role::LabStaff];
/// Closing or cancelling a request.
const CLINICAL: &[Role] = &[Role::CenterAdmin, Role::Doctor, Role::Receptionist];

#[derive(Deserialize)]
pub struct CreateTestRequestBody {
    pub patient_id: Option<Uuid>,
    pub test_type: Option<String>,
    pub test_description: Option<String>,
    pub urgency: Option<Urgency>,
    pub notes: Option<String>,
    /// Required when a superadmin files on behalf of a doctor; ignored otherwise.
    pub doctor_id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct UpdateTestRequestBody {
    pub test_type: Option<String>,
    pub test_description: Option<String>,
    pub urgency: Option<Urgency>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct TestRequestQuery {
    pub status: Option<TestRequestStatus>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub center_id: Option<Uuid>,
    pub lab_staff_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub lab_staff_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ScheduleBody {
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ResultsBody {
    pub results: Option<String>,
    pub result_notes: Option<String>,
    pub conclusion: Option<String>,
    pub recommendations: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct BillingBody {
    pub items: Option<Vec<BillingItem>>,
}

// ── CRUD ─────────────────────────────────────────────────

/// `POST /api/test-requests`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateTestRequestBody>,
) -> Result<(StatusCode, Json<TestRequest>), ApiError> {
    auth.require_role(&[Role::Doctor])?;
    let patient_id = required("patient_id", body.patient_id)?;
    let test_type = required("test_type", body.test_type)?;

    let conn = ctx.core.open_db()?;
    let patient = load_patient(&conn, &auth, &patient_id)?;

    let doctor_id = if auth.is_superadmin() {
        let doctor_id = required("doctor_id", body.doctor_id)?;
        match find_account_by_id(&conn, &doctor_id)? {
            Some(doctor) if doctor.role == Role::Doctor && doctor.is_active => doctor_id,
            Some(_) => {
                return Err(ApiError::BadRequest(
                    "doctor_id must refer to an active doctor".into(),
                ))
            }
            None => return Err(ApiError::NotFound("Doctor not found".into())),
        }
    } else {
        auth.account_id
    };

    let now = Utc::now();
    let req = TestRequest {
        id: Uuid::new_v4(),
        doctor_id,
        patient_id: patient.id,
        center_id: patient.center_id,
        test_type: test_type.trim().to_string(),
        test_description: body.test_description,
        urgency: body.urgency.unwrap_or(Urgency::Normal),
        notes: body.notes,
        status: TestRequestStatus::Pending,
        assigned_lab_staff_id: None,
        collection: CollectionSchedule::default(),
        sample_collected_at: None,
        testing_started_at: None,
        testing_completed_at: None,
        results: TestResults::default(),
        report_file: None,
        report_generated_at: None,
        report_sent_at: None,
        billing: Billing::default(),
        created_at: now,
        updated_at: now,
    };
    insert_test_request(&conn, &req)?;

    tracing::info!(request_id = %req.id, patient_id = %patient.id, "Test request created");
    Ok((StatusCode::CREATED, Json(req)))
}

/// `GET /api/test-requests?status=&patient_id=&doctor_id=&center_id=&lab_staff_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TestRequestQuery>,
) -> Result<Json<Vec<TestRequest>>, ApiError> {
    let mut filter = TestRequestFilter {
        status: query.status,
        patient_id: query.patient_id,
        doctor_id: query.doctor_id,
        center_id: query.center_id,
        lab_staff_id: query.lab_staff_id,
    };
    if auth.role == Role::LabStaff {
        filter.lab_staff_id = Some(auth.account_id);
    } else if let Some(own) = auth.center_scope() {
        filter.center_id = Some(own);
    }

    let conn = ctx.core.open_db()?;
    Ok(Json(list_test_requests(&conn, &filter)?))
}

/// `GET /api/test-requests/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(load_request(&conn, &auth, &id)?))
}

/// `PUT /api/test-requests/:id`: descriptive fields only; status moves
/// through the workflow endpoints.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTestRequestBody>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(&[Role::CenterAdmin, Role::Doctor])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut req = load_request(&conn, &auth, &id)?;
    let loaded_status = req.status;

    if let Some(test_type) = body.test_type {
        req.test_type = required("test_type", Some(test_type))?.trim().to_string();
    }
    if body.test_description.is_some() {
        req.test_description = body.test_description;
    }
    if let Some(urgency) = body.urgency {
        req.urgency = urgency;
    }
    if body.notes.is_some() {
        req.notes = body.notes;
    }
    req.updated_at = Utc::now();

    let saved = update_test_request_details(&conn, &req, loaded_status)?;
    ensure_saved(&conn, &id, saved)?;
    Ok(Json(req))
}

/// `DELETE /api/test-requests/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    auth.require_role(&[Role::CenterAdmin])?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    load_request(&conn, &auth, &id)?;
    delete_test_request(&conn, &id)?;
    tracing::info!(request_id = %id, "Test request deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Workflow steps ───────────────────────────────────────

/// `POST /api/test-requests/:id/assign`
pub async fn assign(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(FRONT_DESK)?;
    let lab_staff_id = required("lab_staff_id", body.lab_staff_id)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;

    match get_lab_staff(&conn, &lab_staff_id)? {
        Some(member) if member.is_active => {}
        Some(_) => return Err(ApiError::Conflict("Lab staff member is inactive".into())),
        None => return Err(ApiError::NotFound("Lab staff not found".into())),
    }

    apply_step(&conn, &auth, &id, |req, now| {
        workflow::assign(req, lab_staff_id, now)
    })
}

/// `POST /api/test-requests/:id/schedule-collection`
pub async fn schedule_collection(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(&[Role::CenterAdmin, Role::Receptionist, Role::LabStaff])?;
    let date = required("date", body.date)?;
    let schedule = CollectionSchedule {
        date: Some(date),
        time_slot: body.time_slot,
        notes: body.notes,
    };
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, |req, now| {
        workflow::schedule_collection(req, schedule, now)
    })
}

/// `POST /api/test-requests/:id/collect-sample`
pub async fn collect_sample(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(LAB_BENCH)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, workflow::collect_sample)
}

/// `POST /api/test-requests/:id/start-testing`
pub async fn start_testing(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(LAB_BENCH)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, workflow::start_testing)
}

/// `POST /api/test-requests/:id/complete-testing`
pub async fn complete_testing(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<ResultsBody>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(LAB_BENCH)?;
    let results = TestResults {
        results: Some(required("results", body.results)?),
        result_notes: body.result_notes,
        conclusion: body.conclusion,
        recommendations: body.recommendations,
    };
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, |req, now| {
        workflow::complete_testing(req, results, now)
    })
}

/// `POST /api/test-requests/:id/generate-report`: renders the PDF.
pub async fn generate_report(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(LAB_BENCH)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut req = load_request(&conn, &auth, &id)?;
    workflow::ensure_report_allowed(&req)?;

    let patient = get_patient(&conn, &req.patient_id)?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;
    let doctor = find_account_by_id(&conn, &req.doctor_id)?;
    let center = match req.center_id {
        Some(center_id) => get_center(&conn, &center_id)?,
        None => None,
    };
    let report_ctx = ReportContext {
        patient: &patient,
        doctor_name: doctor.as_ref().map(|d| d.name.as_str()),
        center_name: center.as_ref().map(|c| c.name.as_str()),
    };
    let file = report::write_report(ctx.core.reports_dir(), &req, &report_ctx)?;

    let from = req.status;
    workflow::record_report(&mut req, file.clone(), Utc::now())?;
    let saved = save_workflow_step(&conn, &req, from)?;
    if let Err(e) = ensure_saved(&conn, &id, saved) {
        discard_report(ctx.core.reports_dir(), &file);
        return Err(e);
    }
    log_step(&auth, &req, from);
    Ok(Json(req))
}

/// `POST /api/test-requests/:id/send-report`: requires a paid bill.
pub async fn send_report(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(FRONT_DESK)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, workflow::send_report)
}

/// `POST /api/test-requests/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(CLINICAL)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, workflow::complete)
}

/// `POST /api/test-requests/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(CLINICAL)?;
    let reason = body.and_then(|Json(b)| b.reason);
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    apply_step(&conn, &auth, &id, |req, now| workflow::cancel(req, reason, now))
}

// ── Billing ──────────────────────────────────────────────

/// `POST /api/test-requests/:id/billing`
pub async fn generate_bill(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(body): Json<BillingBody>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(FRONT_DESK)?;
    let items = required("items", body.items)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut req = load_request(&conn, &auth, &id)?;
    let from = req.billing.status;
    workflow::generate_bill(&mut req, items, Utc::now())?;
    let saved = save_billing(&conn, &req, from)?;
    ensure_saved(&conn, &id, saved)?;
    tracing::info!(
        request_id = %req.id,
        invoice = req.billing.invoice_number.as_deref().unwrap_or(""),
        total = req.billing.total,
        "Bill generated"
    );
    Ok(Json(req))
}

/// `POST /api/test-requests/:id/billing/paid`
pub async fn mark_paid(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<TestRequest>, ApiError> {
    auth.require_role(FRONT_DESK)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let mut req = load_request(&conn, &auth, &id)?;
    let from = req.billing.status;
    workflow::mark_bill_paid(&mut req, Utc::now())?;
    let saved = save_billing(&conn, &req, from)?;
    ensure_saved(&conn, &id, saved)?;
    tracing::info!(request_id = %req.id, "Bill paid");
    Ok(Json(req))
}

// ── Report download ──────────────────────────────────────

/// `GET /api/test-requests/:id/report`: the generated PDF as an attachment.
pub async fn download_report(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let req = {
        let conn = ctx.core.open_db()?;
        load_request(&conn, &auth, &id)?
    };
    let name = req
        .report_file
        .ok_or_else(|| ApiError::NotFound("No report generated".into()))?;
    let path = report::report_path(ctx.core.reports_dir(), &name)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("Report file missing".into()));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}

// ── Helpers ──────────────────────────────────────────────

/// Load a request the caller may see. Lab staff only see requests
/// assigned to them; everyone else is center scoped.
fn load_request(conn: &Connection, auth: &AuthContext, id: &Uuid) -> Result<TestRequest, ApiError> {
    let req = get_test_request(conn, id)?
        .ok_or_else(|| ApiError::NotFound("Test request not found".into()))?;
    if auth.role == Role::LabStaff {
        if req.assigned_lab_staff_id != Some(auth.account_id) {
            return Err(ApiError::Forbidden("Test request is not assigned to you".into()));
        }
    } else {
        auth.ensure_center_access(req.center_id)?;
    }
    Ok(req)
}

fn apply_step<F>(
    conn: &Connection,
    auth: &AuthContext,
    id: &Uuid,
    step: F,
) -> Result<Json<TestRequest>, ApiError>
where
    F: FnOnce(&mut TestRequest, DateTime<Utc>) -> Result<(), WorkflowError>,
{
    let mut req = load_request(conn, auth, id)?;
    let from = req.status;
    step(&mut req, Utc::now())?;
    let saved = save_workflow_step(conn, &req, from)?;
    ensure_saved(conn, id, saved)?;
    log_step(auth, &req, from);
    Ok(Json(req))
}

/// Turn a compare-and-set miss into 404 (row gone) or 409 (row moved on).
fn ensure_saved(conn: &Connection, id: &Uuid, saved: bool) -> Result<(), ApiError> {
    if saved {
        return Ok(());
    }
    match get_test_request(conn, id)? {
        Some(current) => {
            tracing::warn!(request_id = %id, status = %current.status, "Concurrent test request update");
            Err(ApiError::Conflict(
                "Test request was modified concurrently; reload and retry".into(),
            ))
        }
        None => Err(ApiError::NotFound("Test request not found".into())),
    }
}

/// Best-effort removal of a rendered report whose save lost a race.
fn discard_report(dir: &std::path::Path, name: &str) {
    match report::report_path(dir, name) {
        Ok(path) => {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(file = name, "Failed to remove orphaned report: {e}");
            }
        }
        Err(e) => tracing::warn!(file = name, "Failed to locate orphaned report: {e}"),
    }
}

fn log_step(auth: &AuthContext, req: &TestRequest, from: TestRequestStatus) {
    tracing::info!(
        request_id = %req.id,
        from = %from,
        to = %req.status,
        by = %auth.account_id,
        "Test request status changed"
    );
}
