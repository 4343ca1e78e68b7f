use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{optional, DatabaseError};
use crate::models::*;

const HISTORY_COLUMNS: &str = "id, patient_id, chief_complaint, present_illness, past_history,
     family_history, allergies, current_medications, notes, updated_by, created_at, updated_at";

pub fn insert_history(conn: &Connection, history: &History) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO histories ({HISTORY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            history.id,
            history.patient_id,
            history.chief_complaint,
            history.present_illness,
            history.past_history,
            history.family_history,
            history.allergies,
            history.current_medications,
            history.notes,
            history.updated_by,
            history.created_at,
            history.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_history(conn: &Connection, id: &Uuid) -> Result<Option<History>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {HISTORY_COLUMNS} FROM histories WHERE id = ?1"),
        params![id],
        history_from_row,
    ))
}

pub fn list_histories(
    conn: &Connection,
    patient_id: Option<&Uuid>,
) -> Result<Vec<History>, DatabaseError> {
    match patient_id {
        Some(pid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM histories WHERE patient_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![pid], history_from_row)?;
            rows.map(|r| r.map_err(DatabaseError::from)).collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM histories ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], history_from_row)?;
            rows.map(|r| r.map_err(DatabaseError::from)).collect()
        }
    }
}

pub fn update_history(conn: &Connection, history: &History) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE histories SET chief_complaint = ?2, present_illness = ?3, past_history = ?4,
         family_history = ?5, allergies = ?6, current_medications = ?7, notes = ?8,
         updated_by = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            history.id,
            history.chief_complaint,
            history.present_illness,
            history.past_history,
            history.family_history,
            history.allergies,
            history.current_medications,
            history.notes,
            history.updated_by,
            history.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("History", history.id));
    }
    Ok(())
}

pub fn delete_history(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM histories WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<History> {
    Ok(History {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        chief_complaint: row.get(2)?,
        present_illness: row.get(3)?,
        past_history: row.get(4)?,
        family_history: row.get(5)?,
        allergies: row.get(6)?,
        current_medications: row.get(7)?,
        notes: row.get(8)?,
        updated_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
