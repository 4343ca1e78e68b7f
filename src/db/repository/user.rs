use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::WhereClause;
use crate::db::{optional, DatabaseError};
use crate::models::enums::Role;
use crate::models::*;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, center_id, phone, created_at, updated_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, center_id, phone,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.role,
            user.center_id,
            user.phone,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    ))
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email.trim()],
        user_from_row,
    ))
}

pub fn list_users(conn: &Connection, filter: &UserFilter) -> Result<Vec<User>, DatabaseError> {
    let mut clause = WhereClause::new();
    if let Some(role) = filter.role {
        clause.push("role = ?", role);
    }
    if let Some(center_id) = filter.center_id {
        clause.push("center_id = ?", center_id);
    }

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY created_at DESC",
        clause.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(clause.params(), user_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Overwrite every mutable column of an existing user.
pub fn update_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET name = ?2, email = ?3, password_hash = ?4, role = ?5,
         center_id = ?6, phone = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.role,
            user.center_id,
            user.phone,
            user.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user.id));
    }
    Ok(())
}

/// Returns `true` when a row was removed.
pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

pub fn count_users_with_role(conn: &Connection, role: Role) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        center_id: row.get(5)?,
        phone: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
