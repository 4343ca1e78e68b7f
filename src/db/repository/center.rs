use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::{optional, DatabaseError};
use crate::models::*;

const CENTER_COLUMNS: &str =
    "id, name, code, address, phone, email, center_admin_id, created_at, updated_at";

pub fn insert_center(conn: &Connection, center: &Center) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO centers (id, name, code, address, phone, email, center_admin_id,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            center.id,
            center.name,
            center.code,
            center.address,
            center.phone,
            center.email,
            center.center_admin_id,
            center.created_at,
            center.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_center(conn: &Connection, id: &Uuid) -> Result<Option<Center>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {CENTER_COLUMNS} FROM centers WHERE id = ?1"),
        params![id],
        center_from_row,
    ))
}

pub fn list_centers(conn: &Connection) -> Result<Vec<Center>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CENTER_COLUMNS} FROM centers ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], center_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn update_center(conn: &Connection, center: &Center) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE centers SET name = ?2, code = ?3, address = ?4, phone = ?5, email = ?6,
         center_admin_id = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            center.id,
            center.name,
            center.code,
            center.address,
            center.phone,
            center.email,
            center.center_admin_id,
            center.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Center", center.id));
    }
    Ok(())
}

pub fn delete_center(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM centers WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

fn center_from_row(row: &Row<'_>) -> rusqlite::Result<Center> {
    Ok(Center {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        address: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        center_admin_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
