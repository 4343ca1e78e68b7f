use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::WhereClause;
use crate::db::{json_column, optional, DatabaseError};
use crate::models::enums::{BillingStatus, TestRequestStatus};
use crate::models::*;

const TEST_REQUEST_COLUMNS: &str = "id, doctor_id, patient_id, center_id, test_type,
     test_description, urgency, notes, status, assigned_lab_staff_id,
     collection_date, collection_time_slot, collection_notes,
     sample_collected_at, testing_started_at, testing_completed_at,
     results, result_notes, conclusion, recommendations,
     report_file, report_generated_at, report_sent_at,
     billing_status, billing_items, billing_total, invoice_number,
     billing_generated_at, billing_paid_at, created_at, updated_at";

pub fn insert_test_request(conn: &Connection, req: &TestRequest) -> Result<(), DatabaseError> {
    let items = serde_json::to_string(&req.billing.items)?;
    conn.execute(
        &format!(
            "INSERT INTO test_requests ({TEST_REQUEST_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31)"
        ),
        params![
            req.id,
            req.doctor_id,
            req.patient_id,
            req.center_id,
            req.test_type,
            req.test_description,
            req.urgency,
            req.notes,
            req.status,
            req.assigned_lab_staff_id,
            req.collection.date,
            req.collection.time_slot,
            req.collection.notes,
            req.sample_collected_at,
            req.testing_started_at,
            req.testing_completed_at,
            req.results.results,
            req.results.result_notes,
            req.results.conclusion,
            req.results.recommendations,
            req.report_file,
            req.report_generated_at,
            req.report_sent_at,
            req.billing.status,
            items,
            req.billing.total,
            req.billing.invoice_number,
            req.billing.generated_at,
            req.billing.paid_at,
            req.created_at,
            req.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_test_request(conn: &Connection, id: &Uuid) -> Result<Option<TestRequest>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {TEST_REQUEST_COLUMNS} FROM test_requests WHERE id = ?1"),
        params![id],
        test_request_from_row,
    ))
}

pub fn list_test_requests(
    conn: &Connection,
    filter: &TestRequestFilter,
) -> Result<Vec<TestRequest>, DatabaseError> {
    let mut clause = WhereClause::new();
    if let Some(status) = filter.status {
        clause.push("status = ?", status);
    }
    if let Some(patient_id) = filter.patient_id {
        clause.push("patient_id = ?", patient_id);
    }
    if let Some(doctor_id) = filter.doctor_id {
        clause.push("doctor_id = ?", doctor_id);
    }
    if let Some(center_id) = filter.center_id {
        clause.push("center_id = ?", center_id);
    }
    if let Some(lab_staff_id) = filter.lab_staff_id {
        clause.push("assigned_lab_staff_id = ?", lab_staff_id);
    }

    let sql = format!(
        "SELECT {TEST_REQUEST_COLUMNS} FROM test_requests{} ORDER BY created_at DESC",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), test_request_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Save the descriptive fields, provided the stored status is still
/// `expected`. Returns `false` when no row matched.
pub fn update_test_request_details(
    conn: &Connection,
    req: &TestRequest,
    expected: TestRequestStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE test_requests SET
            test_type = ?3, test_description = ?4, urgency = ?5, notes = ?6, updated_at = ?7
         WHERE id = ?1 AND status = ?2",
        params![
            req.id,
            expected,
            req.test_type,
            req.test_description,
            req.urgency,
            req.notes,
            req.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Persist a workflow step as a compare-and-set on `status`. Billing
/// columns are never written here. Returns `false` when the stored
/// status is no longer `expected` or the row is gone.
pub fn save_workflow_step(
    conn: &Connection,
    req: &TestRequest,
    expected: TestRequestStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE test_requests SET
            notes = ?3, status = ?4, assigned_lab_staff_id = ?5, collection_date = ?6,
            collection_time_slot = ?7, collection_notes = ?8, sample_collected_at = ?9,
            testing_started_at = ?10, testing_completed_at = ?11, results = ?12,
            result_notes = ?13, conclusion = ?14, recommendations = ?15, report_file = ?16,
            report_generated_at = ?17, report_sent_at = ?18, updated_at = ?19
         WHERE id = ?1 AND status = ?2",
        params![
            req.id,
            expected,
            req.notes,
            req.status,
            req.assigned_lab_staff_id,
            req.collection.date,
            req.collection.time_slot,
            req.collection.notes,
            req.sample_collected_at,
            req.testing_started_at,
            req.testing_completed_at,
            req.results.results,
            req.results.result_notes,
            req.results.conclusion,
            req.results.recommendations,
            req.report_file,
            req.report_generated_at,
            req.report_sent_at,
            req.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

/// Persist the bill as a compare-and-set on `billing_status`. Refuses
/// cancelled requests. Returns `false` when nothing matched.
pub fn save_billing(
    conn: &Connection,
    req: &TestRequest,
    expected: BillingStatus,
) -> Result<bool, DatabaseError> {
    let items = serde_json::to_string(&req.billing.items)?;
    let changed = conn.execute(
        "UPDATE test_requests SET
            billing_status = ?4, billing_items = ?5, billing_total = ?6, invoice_number = ?7,
            billing_generated_at = ?8, billing_paid_at = ?9, updated_at = ?10
         WHERE id = ?1 AND billing_status = ?2 AND status <> ?3",
        params![
            req.id,
            expected,
            TestRequestStatus::Cancelled,
            req.billing.status,
            items,
            req.billing.total,
            req.billing.invoice_number,
            req.billing.generated_at,
            req.billing.paid_at,
            req.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_test_request(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM test_requests WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn test_request_from_row(row: &Row<'_>) -> rusqlite::Result<TestRequest> {
    Ok(TestRequest {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        center_id: row.get(3)?,
        test_type: row.get(4)?,
        test_description: row.get(5)?,
        urgency: row.get(6)?,
        notes: row.get(7)?,
        status: row.get(8)?,
        assigned_lab_staff_id: row.get(9)?,
        collection: CollectionSchedule {
            date: row.get(10)?,
            time_slot: row.get(11)?,
            notes: row.get(12)?,
        },
        sample_collected_at: row.get(13)?,
        testing_started_at: row.get(14)?,
        testing_completed_at: row.get(15)?,
        results: TestResults {
            results: row.get(16)?,
            result_notes: row.get(17)?,
            conclusion: row.get(18)?,
            recommendations: row.get(19)?,
        },
        report_file: row.get(20)?,
        report_generated_at: row.get(21)?,
        report_sent_at: row.get(22)?,
        billing: Billing {
            status: row.get(23)?,
            items: json_column(row, 24)?,
            total: row.get(25)?,
            invoice_number: row.get(26)?,
            generated_at: row.get(27)?,
            paid_at: row.get(28)?,
        },
        created_at: row.get(29)?,
        updated_at: row.get(30)?,
    })
}
