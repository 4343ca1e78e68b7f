use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FollowUpKind;

/// Condition follow-up visit. `details` holds the condition-specific
/// symptom scores and observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kind: FollowUpKind,
    pub details: serde_json::Value,
    pub notes: Option<String>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
