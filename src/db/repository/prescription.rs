use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{optional, DatabaseError};
use crate::models::*;

const PRESCRIPTION_COLUMNS: &str =
    "id, patient_id, visit, notes, prescribed_by, updated_by, created_at, updated_at";

/// Insert a prescription and its medication lines in one transaction.
pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!(
            "INSERT INTO prescriptions ({PRESCRIPTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            rx.id,
            rx.patient_id,
            rx.visit,
            rx.notes,
            rx.prescribed_by,
            rx.updated_by,
            rx.created_at,
            rx.updated_at,
        ],
    )?;
    insert_medications(&tx, &rx.id, &rx.medications)?;
    tx.commit()?;
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let found = optional(conn.query_row(
        &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1"),
        params![id],
        prescription_from_row,
    ))?;
    match found {
        Some(mut rx) => {
            rx.medications = get_medications(conn, &rx.id)?;
            Ok(Some(rx))
        }
        None => Ok(None),
    }
}

pub fn list_prescriptions(
    conn: &Connection,
    patient_id: Option<&Uuid>,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut prescriptions = match patient_id {
        Some(pid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
                 WHERE patient_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![pid], prescription_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], prescription_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    for rx in &mut prescriptions {
        rx.medications = get_medications(conn, &rx.id)?;
    }
    Ok(prescriptions)
}

/// Overwrite the prescription and replace its medication lines.
pub fn update_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE prescriptions SET visit = ?2, notes = ?3, updated_by = ?4, updated_at = ?5
         WHERE id = ?1",
        params![rx.id, rx.visit, rx.notes, rx.updated_by, rx.updated_at],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Prescription", rx.id));
    }
    tx.execute(
        "DELETE FROM prescription_medications WHERE prescription_id = ?1",
        params![rx.id],
    )?;
    insert_medications(&tx, &rx.id, &rx.medications)?;
    tx.commit()?;
    Ok(())
}

/// Medication lines go with the prescription via ON DELETE CASCADE.
pub fn delete_prescription(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM prescriptions WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn insert_medications(
    conn: &Connection,
    prescription_id: &Uuid,
    medications: &[Medication],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO prescription_medications
         (id, prescription_id, position, drug_name, dose, duration, instructions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, med) in medications.iter().enumerate() {
        stmt.execute(params![
            Uuid::new_v4(),
            prescription_id,
            position as i64,
            med.drug_name,
            med.dose,
            med.duration,
            med.instructions,
        ])?;
    }
    Ok(())
}

fn get_medications(conn: &Connection, prescription_id: &Uuid) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT drug_name, dose, duration, instructions FROM prescription_medications
         WHERE prescription_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![prescription_id], |row| {
        Ok(Medication {
            drug_name: row.get(0)?,
            dose: row.get(1)?,
            duration: row.get(2)?,
            instructions: row.get(3)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit: row.get(2)?,
        notes: row.get(3)?,
        medications: Vec::new(),
        prescribed_by: row.get(4)?,
        updated_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
