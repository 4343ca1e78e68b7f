use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{optional, DatabaseError};
use crate::models::*;

const LAB_STAFF_COLUMNS: &str = "id, name, email, password_hash, phone, lab_name, designation,
     is_active, created_at, updated_at";

pub fn insert_lab_staff(conn: &Connection, member: &LabStaffMember) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO lab_staff ({LAB_STAFF_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            member.id,
            member.name,
            member.email,
            member.password_hash,
            member.phone,
            member.lab_name,
            member.designation,
            member.is_active,
            member.created_at,
            member.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_lab_staff(conn: &Connection, id: &Uuid) -> Result<Option<LabStaffMember>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {LAB_STAFF_COLUMNS} FROM lab_staff WHERE id = ?1"),
        params![id],
        lab_staff_from_row,
    ))
}

pub fn get_lab_staff_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<LabStaffMember>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {LAB_STAFF_COLUMNS} FROM lab_staff WHERE email = ?1"),
        params![email.trim()],
        lab_staff_from_row,
    ))
}

pub fn list_lab_staff(conn: &Connection) -> Result<Vec<LabStaffMember>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LAB_STAFF_COLUMNS} FROM lab_staff ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], lab_staff_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_lab_staff(conn: &Connection, member: &LabStaffMember) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_staff SET name = ?2, email = ?3, password_hash = ?4, phone = ?5,
         lab_name = ?6, designation = ?7, is_active = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            member.id,
            member.name,
            member.email,
            member.password_hash,
            member.phone,
            member.lab_name,
            member.designation,
            member.is_active,
            member.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("LabStaff", member.id));
    }
    Ok(())
}

pub fn delete_lab_staff(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM lab_staff WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn lab_staff_from_row(row: &Row<'_>) -> rusqlite::Result<LabStaffMember> {
    Ok(LabStaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        lab_name: row.get(5)?,
        designation: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
