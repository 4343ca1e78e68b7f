//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::enums::{AccountSource, Role};
use crate::models::Account;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Auth context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the token and the account have both been checked.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub center_id: Option<Uuid>,
    pub source: AccountSource,
}

impl From<Account> for AuthContext {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
            center_id: account.center_id,
            source: account.source,
        }
    }
}

impl AuthContext {
    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// Superadmin and the doctors / receptionists it manages work across
    /// every center.
    pub fn has_global_scope(&self) -> bool {
        self.is_superadmin()
            || matches!(
                self.source,
                AccountSource::SuperadminDoctors | AccountSource::SuperadminReceptionists
            )
    }

    pub fn require_superadmin(&self) -> Result<(), ApiError> {
        if self.is_superadmin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Superadmin access required".into()))
        }
    }

    /// Superadmin always passes.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.is_superadmin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Role {} may not perform this action",
                self.role
            )))
        }
    }

    pub fn ensure_center_access(&self, center_id: Option<Uuid>) -> Result<(), ApiError> {
        if self.has_global_scope() {
            return Ok(());
        }
        match (self.center_id, center_id) {
            (Some(own), Some(target)) if own == target => Ok(()),
            _ => Err(ApiError::Forbidden("Resource belongs to another center".into())),
        }
    }

    /// Center filter forced onto list queries; `None` means unrestricted.
    pub fn center_scope(&self) -> Option<Uuid> {
        if self.has_global_scope() {
            None
        } else {
            self.center_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, center_id: Option<Uuid>, source: AccountSource) -> AuthContext {
        AuthContext {
            account_id: Uuid::new_v4(),
            name: "Caller".into(),
            email: "caller@clinic.test".into(),
            role,
            center_id,
            source,
        }
    }

    #[test]
    fn superadmin_passes_every_check() {
        let admin = caller(Role::Superadmin, None, AccountSource::Users);
        assert!(admin.require_superadmin().is_ok());
        assert!(admin.require_role(&[Role::LabStaff]).is_ok());
        assert!(admin.ensure_center_access(Some(Uuid::new_v4())).is_ok());
        assert_eq!(admin.center_scope(), None);
    }

    #[test]
    fn center_user_limited_to_own_center() {
        let own = Uuid::new_v4();
        let doctor = caller(Role::Doctor, Some(own), AccountSource::Users);
        assert!(doctor.ensure_center_access(Some(own)).is_ok());
        assert!(matches!(
            doctor.ensure_center_access(Some(Uuid::new_v4())),
            Err(ApiError::Forbidden(_))
        ));
        assert!(doctor.ensure_center_access(None).is_err());
        assert_eq!(doctor.center_scope(), Some(own));
    }

    #[test]
    fn superadmin_staff_have_global_scope() {
        let doctor = caller(Role::Doctor, None, AccountSource::SuperadminDoctors);
        assert!(doctor.ensure_center_access(Some(Uuid::new_v4())).is_ok());
        assert!(doctor.require_superadmin().is_err());
    }

    #[test]
    fn lab_staff_has_no_center_access() {
        let lab = caller(Role::LabStaff, None, AccountSource::LabStaff);
        assert!(lab.ensure_center_access(Some(Uuid::new_v4())).is_err());
        assert!(lab.require_role(&[Role::LabStaff]).is_ok());
        assert!(lab.require_role(&[Role::Doctor]).is_err());
    }
}
