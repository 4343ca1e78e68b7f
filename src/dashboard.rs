//! Dashboard summaries assembled from the aggregate counters.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{
    billing_totals, count_centers, count_lab_staff, count_patients, count_staff,
    count_test_requests_by_status, count_users_by_role, StaffKind,
};
use crate::db::DatabaseError;
use crate::models::enums::{BillingStatus, Role, TestRequestStatus};
use crate::models::TestRequestFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillingSummary {
    pub not_generated: i64,
    pub generated: i64,
    pub paid: i64,
    /// Sum of paid bill totals.
    pub revenue: i64,
    /// Sum of generated but unpaid bill totals.
    pub outstanding: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuperadminDashboard {
    pub centers: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub superadmin_doctors: i64,
    pub superadmin_receptionists: i64,
    pub lab_staff: i64,
    pub patients: i64,
    pub test_requests: i64,
    pub test_requests_by_status: BTreeMap<String, i64>,
    pub billing: BillingSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct CenterDashboard {
    pub center_id: Uuid,
    pub users_by_role: BTreeMap<String, i64>,
    pub patients: i64,
    pub test_requests: i64,
    pub test_requests_by_status: BTreeMap<String, i64>,
    pub billing: BillingSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabDashboard {
    pub lab_staff_id: Uuid,
    pub assigned: i64,
    /// Assigned requests not yet in a terminal state.
    pub open: i64,
    pub test_requests_by_status: BTreeMap<String, i64>,
}

pub fn superadmin_dashboard(conn: &Connection) -> Result<SuperadminDashboard, DatabaseError> {
    let scope = TestRequestFilter::default();
    let (by_status, total) = status_counts(conn, &scope)?;
    Ok(SuperadminDashboard {
        centers: count_centers(conn)?,
        users_by_role: role_counts(conn, None)?,
        superadmin_doctors: count_staff(conn, StaffKind::Doctor)?,
        superadmin_receptionists: count_staff(conn, StaffKind::Receptionist)?,
        lab_staff: count_lab_staff(conn)?,
        patients: count_patients(conn, None)?,
        test_requests: total,
        test_requests_by_status: by_status,
        billing: billing_summary(conn, &scope)?,
    })
}

pub fn center_dashboard(
    conn: &Connection,
    center_id: Uuid,
) -> Result<CenterDashboard, DatabaseError> {
    let scope = TestRequestFilter {
        center_id: Some(center_id),
        ..Default::default()
    };
    let (by_status, total) = status_counts(conn, &scope)?;
    Ok(CenterDashboard {
        center_id,
        users_by_role: role_counts(conn, Some(&center_id))?,
        patients: count_patients(conn, Some(&center_id))?,
        test_requests: total,
        test_requests_by_status: by_status,
        billing: billing_summary(conn, &scope)?,
    })
}

pub fn lab_dashboard(conn: &Connection, lab_staff_id: Uuid) -> Result<LabDashboard, DatabaseError> {
    let scope = TestRequestFilter {
        lab_staff_id: Some(lab_staff_id),
        ..Default::default()
    };
    let counts = count_test_requests_by_status(conn, &scope)?;
    let open = counts
        .iter()
        .filter(|(status, _)| !status.is_terminal())
        .map(|(_, n)| n)
        .sum();
    let (by_status, total) = fill_statuses(counts);
    Ok(LabDashboard {
        lab_staff_id,
        assigned: total,
        open,
        test_requests_by_status: by_status,
    })
}

fn status_counts(
    conn: &Connection,
    scope: &TestRequestFilter,
) -> Result<(BTreeMap<String, i64>, i64), DatabaseError> {
    Ok(fill_statuses(count_test_requests_by_status(conn, scope)?))
}

/// Every status appears in the map, zero when absent.
fn fill_statuses(counts: Vec<(TestRequestStatus, i64)>) -> (BTreeMap<String, i64>, i64) {
    let mut map: BTreeMap<String, i64> = TestRequestStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut total = 0;
    for (status, n) in counts {
        map.insert(status.as_str().to_string(), n);
        total += n;
    }
    (map, total)
}

fn role_counts(
    conn: &Connection,
    center_id: Option<&Uuid>,
) -> Result<BTreeMap<String, i64>, DatabaseError> {
    let mut map: BTreeMap<String, i64> = Role::ALL
        .iter()
        .filter(|r| center_id.is_none() || r.is_center_role())
        .filter(|r| **r != Role::LabStaff)
        .map(|r| (r.as_str().to_string(), 0))
        .collect();
    for (role, n) in count_users_by_role(conn, center_id)? {
        map.insert(role.as_str().to_string(), n);
    }
    Ok(map)
}

fn billing_summary(
    conn: &Connection,
    scope: &TestRequestFilter,
) -> Result<BillingSummary, DatabaseError> {
    let mut summary = BillingSummary::default();
    for (status, count, total) in billing_totals(conn, scope)? {
        match status {
            BillingStatus::NotGenerated => summary.not_generated = count,
            BillingStatus::Generated => {
                summary.generated = count;
                summary.outstanding = total;
            }
            BillingStatus::Paid => {
                summary.paid = count;
                summary.revenue = total;
            }
        }
    }
    Ok(summary)
}
