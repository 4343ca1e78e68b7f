use uuid::Uuid;

use super::enums::{Role, TestRequestStatus};

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub center_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct PatientFilter {
    pub center_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// Case-insensitive match on name, phone or email.
    pub search: Option<String>,
}

#[derive(Debug, Default)]
pub struct TestRequestFilter {
    pub status: Option<TestRequestStatus>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub center_id: Option<Uuid>,
    pub lab_staff_id: Option<Uuid>,
}
