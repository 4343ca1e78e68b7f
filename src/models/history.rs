use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-text clinical history captured at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub chief_complaint: Option<String>,
    pub present_illness: Option<String>,
    pub past_history: Option<String>,
    pub family_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub notes: Option<String>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
