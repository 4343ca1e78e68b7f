use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AccountSource, Role};

/// Per-center account (or the global superadmin) from the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub center_id: Option<Uuid>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Doctor or receptionist managed by the superadmin, outside any center.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub designation: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabStaffMember {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub lab_name: Option<String>,
    pub designation: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account resolved from any of the four account tables.
///
/// Carries only what authentication and authorization need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub center_id: Option<Uuid>,
    pub source: AccountSource,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            center_id: user.center_id,
            source: AccountSource::Users,
            is_active: true,
            password_hash: user.password_hash,
        }
    }
}

impl From<LabStaffMember> for Account {
    fn from(member: LabStaffMember) -> Self {
        Self {
            id: member.id,
            name: member.name,
            email: member.email,
            role: Role::LabStaff,
            center_id: None,
            source: AccountSource::LabStaff,
            is_active: member.is_active,
            password_hash: member.password_hash,
        }
    }
}

impl StaffMember {
    pub fn into_account(self, source: AccountSource) -> Account {
        let role = match source {
            AccountSource::SuperadminReceptionists => Role::Receptionist,
            _ => Role::Doctor,
        };
        Account {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
            center_id: None,
            source,
            is_active: self.is_active,
            password_hash: self.password_hash,
        }
    }
}
