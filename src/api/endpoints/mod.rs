//! API endpoint handlers.
//!
//! One module per resource. Request bodies use `Option` fields so a
//! missing required field is reported as a 400 naming that field.

pub mod auth;
pub mod centers;
pub mod dashboard;
pub mod followups;
pub mod health;
pub mod histories;
pub mod lab_staff;
pub mod patients;
pub mod prescriptions;
pub mod superadmin_staff;
pub mod test_requests;
pub mod users;

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::crypto::{hash_password, verify_password};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Stand-in hash checked when a login names no account, so unknown and
/// known emails cost the same.
static UNKNOWN_ACCOUNT_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("allercare-unknown-account"));

/// Parse a path id. Malformed ids cannot match any record.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}

/// Unwrap a required field, rejecting absent or blank values.
pub(crate) fn required<T: Present>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    match value {
        Some(v) if v.is_present() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}

pub(crate) trait Present {
    fn is_present(&self) -> bool;
}

impl Present for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

macro_rules! always_present {
    ($($t:ty),+) => {
        $(impl Present for $t {
            fn is_present(&self) -> bool {
                true
            }
        })+
    };
}

always_present!(
    u32,
    Uuid,
    chrono::NaiveDate,
    crate::models::enums::Gender,
    crate::models::enums::Role,
    crate::models::enums::FollowUpKind,
    serde_json::Value
);

impl<T> Present for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// Validate and hash a new password. PBKDF2 runs on the blocking pool.
pub(crate) async fn new_password_hash(password: String) -> Result<String, ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {e}")))
}

/// Check a login password on the blocking pool. `None` (no such account)
/// runs the same derivation against a stand-in hash and never matches.
pub(crate) async fn verify_login_password(
    password: String,
    stored: Option<String>,
) -> Result<bool, ApiError> {
    let known = stored.is_some();
    let matched = tokio::task::spawn_blocking(move || {
        let hash = stored.as_deref().unwrap_or(UNKNOWN_ACCOUNT_HASH.as_str());
        verify_password(&password, hash)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Password check task failed: {e}")))??;
    Ok(known && matched)
}

/// Normalize an email address for storage.
pub(crate) fn normalize_email(raw: String) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ApiError::BadRequest(format!("Invalid email: {raw}")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_blank_strings() {
        assert!(required("name", Some("  ".to_string())).is_err());
        assert!(required::<String>("name", None).is_err());
        assert_eq!(required("name", Some("Asha".to_string())).unwrap(), "Asha");
    }

    #[test]
    fn required_error_names_field() {
        match required::<u32>("age", None) {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "age is required"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn email_normalized() {
        assert_eq!(normalize_email(" Admin@Clinic.Test ".into()).unwrap(), "admin@clinic.test");
        assert!(normalize_email("not-an-email".into()).is_err());
    }

    #[tokio::test]
    async fn short_password_rejected() {
        assert!(new_password_hash("short".into()).await.is_err());
        let hash = new_password_hash("long enough".into()).await.unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$"));
    }

    #[tokio::test]
    async fn login_password_checked_against_stored_hash() {
        let stored = new_password_hash("correct horse".into()).await.unwrap();
        assert!(verify_login_password("correct horse".into(), Some(stored.clone()))
            .await
            .unwrap());
        assert!(!verify_login_password("wrong horse".into(), Some(stored))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_account_never_matches() {
        // Even the stand-in's own password must not log anyone in.
        assert!(!verify_login_password("allercare-unknown-account".into(), None)
            .await
            .unwrap());
        assert!(!verify_login_password("anything".into(), None).await.unwrap());
    }
}
