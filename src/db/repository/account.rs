//! Cross-table account resolution.
//!
//! An authenticated id (or a login email) may belong to any of four
//! tables. They are searched in the fixed order of `AccountSource::ALL`
//! and the first hit wins.

use rusqlite::Connection;
use uuid::Uuid;

use super::staff::StaffKind;
use super::{
    get_lab_staff, get_lab_staff_by_email, get_staff, get_staff_by_email, get_user,
    get_user_by_email,
};
use crate::db::DatabaseError;
use crate::models::enums::AccountSource;
use crate::models::Account;

pub fn find_account_by_id(conn: &Connection, id: &Uuid) -> Result<Option<Account>, DatabaseError> {
    for source in AccountSource::ALL {
        let found = match source {
            AccountSource::Users => get_user(conn, id)?.map(Account::from),
            AccountSource::SuperadminDoctors => get_staff(conn, StaffKind::Doctor, id)?
                .map(|s| s.into_account(AccountSource::SuperadminDoctors)),
            AccountSource::SuperadminReceptionists => get_staff(conn, StaffKind::Receptionist, id)?
                .map(|s| s.into_account(AccountSource::SuperadminReceptionists)),
            AccountSource::LabStaff => get_lab_staff(conn, id)?.map(Account::from),
        };
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

pub fn find_account_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Account>, DatabaseError> {
    for source in AccountSource::ALL {
        let found = match source {
            AccountSource::Users => get_user_by_email(conn, email)?.map(Account::from),
            AccountSource::SuperadminDoctors => get_staff_by_email(conn, StaffKind::Doctor, email)?
                .map(|s| s.into_account(AccountSource::SuperadminDoctors)),
            AccountSource::SuperadminReceptionists => {
                get_staff_by_email(conn, StaffKind::Receptionist, email)?
                    .map(|s| s.into_account(AccountSource::SuperadminReceptionists))
            }
            AccountSource::LabStaff => get_lab_staff_by_email(conn, email)?.map(Account::from),
        };
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// True when `email` is already taken in any account table.
pub fn email_in_use(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    Ok(find_account_by_email(conn, email)?.is_some())
}
