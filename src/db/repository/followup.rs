use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::WhereClause;
use crate::db::{json_column, optional, DatabaseError};
use crate::models::enums::FollowUpKind;
use crate::models::*;

const FOLLOWUP_COLUMNS: &str =
    "id, patient_id, kind, details, notes, updated_by, created_at, updated_at";

pub fn insert_followup(conn: &Connection, followup: &FollowUp) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO followups ({FOLLOWUP_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            followup.id,
            followup.patient_id,
            followup.kind,
            serde_json::to_string(&followup.details)?,
            followup.notes,
            followup.updated_by,
            followup.created_at,
            followup.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_followup(conn: &Connection, id: &Uuid) -> Result<Option<FollowUp>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE id = ?1"),
        params![id],
        followup_from_row,
    ))
}

pub fn list_followups(
    conn: &Connection,
    patient_id: Option<Uuid>,
    kind: Option<FollowUpKind>,
) -> Result<Vec<FollowUp>, DatabaseError> {
    let mut clause = WhereClause::new();
    if let Some(pid) = patient_id {
        clause.push("patient_id = ?", pid);
    }
    if let Some(kind) = kind {
        clause.push("kind = ?", kind);
    }
    let sql = format!(
        "SELECT {FOLLOWUP_COLUMNS} FROM followups{} ORDER BY created_at DESC",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), followup_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_followup(conn: &Connection, followup: &FollowUp) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE followups SET kind = ?2, details = ?3, notes = ?4, updated_by = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            followup.id,
            followup.kind,
            serde_json::to_string(&followup.details)?,
            followup.notes,
            followup.updated_by,
            followup.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("FollowUp", followup.id));
    }
    Ok(())
}

pub fn delete_followup(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM followups WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn followup_from_row(row: &Row<'_>) -> rusqlite::Result<FollowUp> {
    Ok(FollowUp {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        kind: row.get(2)?,
        details: json_column(row, 3)?,
        notes: row.get(4)?,
        updated_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
