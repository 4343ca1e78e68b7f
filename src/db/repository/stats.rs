//! Aggregate counters backing the dashboards.

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::staff::StaffKind;
use super::WhereClause;
use crate::db::DatabaseError;
use crate::models::enums::{BillingStatus, Role, TestRequestStatus};
use crate::models::TestRequestFilter;

pub fn count_centers(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM centers", [], |row| row.get(0))?)
}

pub fn count_lab_staff(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM lab_staff", [], |row| row.get(0))?)
}

pub fn count_staff(conn: &Connection, kind: StaffKind) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", kind.table()),
        [],
        |row| row.get(0),
    )?)
}

pub fn count_patients(conn: &Connection, center_id: Option<&Uuid>) -> Result<i64, DatabaseError> {
    let count = match center_id {
        Some(cid) => conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE center_id = ?1",
            params![cid],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?,
    };
    Ok(count)
}

/// User counts per role; roles with no users are omitted.
pub fn count_users_by_role(
    conn: &Connection,
    center_id: Option<&Uuid>,
) -> Result<Vec<(Role, i64)>, DatabaseError> {
    let mut clause = WhereClause::new();
    if let Some(cid) = center_id {
        clause.push("center_id = ?", *cid);
    }
    let sql = format!(
        "SELECT role, COUNT(*) FROM users{} GROUP BY role ORDER BY role",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Test request counts per status within the filter's center / lab staff scope.
pub fn count_test_requests_by_status(
    conn: &Connection,
    scope: &TestRequestFilter,
) -> Result<Vec<(TestRequestStatus, i64)>, DatabaseError> {
    let clause = scope_clause(scope);
    let sql = format!(
        "SELECT status, COUNT(*) FROM test_requests{} GROUP BY status",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// `(status, bill count, summed total)` per billing status.
pub fn billing_totals(
    conn: &Connection,
    scope: &TestRequestFilter,
) -> Result<Vec<(BillingStatus, i64, i64)>, DatabaseError> {
    let clause = scope_clause(scope);
    let sql = format!(
        "SELECT billing_status, COUNT(*), COALESCE(SUM(billing_total), 0)
         FROM test_requests{} GROUP BY billing_status",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn scope_clause(scope: &TestRequestFilter) -> WhereClause {
    let mut clause = WhereClause::new();
    if let Some(cid) = scope.center_id {
        clause.push("center_id = ?", cid);
    }
    if let Some(lab_id) = scope.lab_staff_id {
        clause.push("assigned_lab_staff_id = ?", lab_id);
    }
    if let Some(doctor_id) = scope.doctor_id {
        clause.push("doctor_id = ?", doctor_id);
    }
    clause
}
