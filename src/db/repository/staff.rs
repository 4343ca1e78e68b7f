//! Superadmin-managed doctors and receptionists.
//!
//! Both live in tables with identical shape; `StaffKind` picks the table.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{optional, DatabaseError};
use crate::models::enums::AccountSource;
use crate::models::*;

const STAFF_COLUMNS: &str = "id, name, email, password_hash, phone, qualification, designation,
     is_active, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffKind {
    Doctor,
    Receptionist,
}

impl StaffKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Doctor => "superadmin_doctors",
            Self::Receptionist => "superadmin_receptionists",
        }
    }

    pub fn source(self) -> AccountSource {
        match self {
            Self::Doctor => AccountSource::SuperadminDoctors,
            Self::Receptionist => AccountSource::SuperadminReceptionists,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Doctor => "Doctor",
            Self::Receptionist => "Receptionist",
        }
    }
}

pub fn insert_staff(
    conn: &Connection,
    kind: StaffKind,
    member: &StaffMember,
) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO {} ({STAFF_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            kind.table()
        ),
        params![
            member.id,
            member.name,
            member.email,
            member.password_hash,
            member.phone,
            member.qualification,
            member.designation,
            member.is_active,
            member.created_at,
            member.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_staff(
    conn: &Connection,
    kind: StaffKind,
    id: &Uuid,
) -> Result<Option<StaffMember>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {STAFF_COLUMNS} FROM {} WHERE id = ?1", kind.table()),
        params![id],
        staff_from_row,
    ))
}

pub fn get_staff_by_email(
    conn: &Connection,
    kind: StaffKind,
    email: &str,
) -> Result<Option<StaffMember>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {STAFF_COLUMNS} FROM {} WHERE email = ?1", kind.table()),
        params![email.trim()],
        staff_from_row,
    ))
}

pub fn list_staff(conn: &Connection, kind: StaffKind) -> Result<Vec<StaffMember>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAFF_COLUMNS} FROM {} ORDER BY name COLLATE NOCASE",
        kind.table()
    ))?;
    let rows = stmt.query_map([], staff_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_staff(
    conn: &Connection,
    kind: StaffKind,
    member: &StaffMember,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET name = ?2, email = ?3, password_hash = ?4, phone = ?5,
             qualification = ?6, designation = ?7, is_active = ?8, updated_at = ?9
             WHERE id = ?1",
            kind.table()
        ),
        params![
            member.id,
            member.name,
            member.email,
            member.password_hash,
            member.phone,
            member.qualification,
            member.designation,
            member.is_active,
            member.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found(kind.label(), member.id));
    }
    Ok(())
}

pub fn delete_staff(conn: &Connection, kind: StaffKind, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
        params![id],
    )?;
    Ok(deleted > 0)
}

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<StaffMember> {
    Ok(StaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        qualification: row.get(5)?,
        designation: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
