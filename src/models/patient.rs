use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub age: u32,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub center_id: Option<Uuid>,
    pub assigned_doctor_id: Option<Uuid>,
    pub registered_by: Option<Uuid>,
    pub tests: Vec<PatientTest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Test entry embedded in the patient record (stored as a JSON array).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientTest {
    pub test_name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<Uuid>,
}
