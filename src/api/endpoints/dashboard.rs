//! Dashboard summaries per audience.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::dashboard::{
    center_dashboard, lab_dashboard, superadmin_dashboard, CenterDashboard, LabDashboard,
    SuperadminDashboard,
};
use crate::models::enums::Role;

#[derive(Deserialize, Default)]
pub struct CenterQuery {
    pub center_id: Option<Uuid>,
}

/// `GET /api/dashboard/superadmin`
pub async fn superadmin(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SuperadminDashboard>, ApiError> {
    auth.require_superadmin()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(superadmin_dashboard(&conn)?))
}

/// `GET /api/dashboard/center`: own center, or `center_id` for superadmin.
pub async fn center(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CenterQuery>,
) -> Result<Json<CenterDashboard>, ApiError> {
    auth.require_role(&[Role::CenterAdmin, Role::Doctor, Role::Receptionist])?;
    let center_id = match auth.center_id {
        Some(own) if !auth.is_superadmin() => own,
        _ => query
            .center_id
            .ok_or_else(|| ApiError::BadRequest("center_id is required".into()))?,
    };
    auth.ensure_center_access(Some(center_id))?;
    let conn = ctx.core.open_db()?;
    Ok(Json(center_dashboard(&conn, center_id)?))
}

/// `GET /api/dashboard/lab`: requests assigned to the calling lab staff.
pub async fn lab(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<LabDashboard>, ApiError> {
    if auth.role != Role::LabStaff {
        return Err(ApiError::Forbidden("Lab staff only".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(lab_dashboard(&conn, auth.account_id)?))
}
