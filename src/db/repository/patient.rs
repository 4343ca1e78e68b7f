use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::WhereClause;
use crate::db::{json_column, optional, DatabaseError};
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, name, gender, age, phone, email, address, center_id,
     assigned_doctor_id, registered_by, tests, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let tests = serde_json::to_string(&patient.tests)?;
    conn.execute(
        &format!(
            "INSERT INTO patients ({PATIENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            patient.id,
            patient.name,
            patient.gender,
            patient.age,
            patient.phone,
            patient.email,
            patient.address,
            patient.center_id,
            patient.assigned_doctor_id,
            patient.registered_by,
            tests,
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id],
        patient_from_row,
    ))
}

pub fn list_patients(
    conn: &Connection,
    filter: &PatientFilter,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut clause = WhereClause::new();
    if let Some(center_id) = filter.center_id {
        clause.push("center_id = ?", center_id);
    }
    if let Some(doctor_id) = filter.doctor_id {
        clause.push("assigned_doctor_id = ?", doctor_id);
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        clause.push_search(&["name", "phone", "email"], term);
    }

    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients{} ORDER BY created_at DESC",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), patient_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let tests = serde_json::to_string(&patient.tests)?;
    let changed = conn.execute(
        "UPDATE patients SET name = ?2, gender = ?3, age = ?4, phone = ?5, email = ?6,
         address = ?7, center_id = ?8, assigned_doctor_id = ?9, tests = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            patient.id,
            patient.name,
            patient.gender,
            patient.age,
            patient.phone,
            patient.email,
            patient.address,
            patient.center_id,
            patient.assigned_doctor_id,
            tests,
            patient.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Patient", patient.id));
    }
    Ok(())
}

pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        age: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        address: row.get(6)?,
        center_id: row.get(7)?,
        assigned_doctor_id: row.get(8)?,
        registered_by: row.get(9)?,
        tests: json_column(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
