use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BillingStatus, TestRequestStatus, Urgency};

/// Lab-test workflow record, from the doctor's request to report delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub center_id: Option<Uuid>,
    pub test_type: String,
    pub test_description: Option<String>,
    pub urgency: Urgency,
    pub notes: Option<String>,
    pub status: TestRequestStatus,
    pub assigned_lab_staff_id: Option<Uuid>,
    pub collection: CollectionSchedule,
    pub sample_collected_at: Option<DateTime<Utc>>,
    pub testing_started_at: Option<DateTime<Utc>>,
    pub testing_completed_at: Option<DateTime<Utc>>,
    pub results: TestResults,
    pub report_file: Option<String>,
    pub report_generated_at: Option<DateTime<Utc>>,
    pub report_sent_at: Option<DateTime<Utc>>,
    pub billing: Billing,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchedule {
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub results: Option<String>,
    pub result_notes: Option<String>,
    pub conclusion: Option<String>,
    pub recommendations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    pub status: BillingStatus,
    pub items: Vec<BillingItem>,
    /// Sum of item amounts, in minor currency units.
    pub total: i64,
    pub invoice_number: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Default for Billing {
    fn default() -> Self {
        Self {
            status: BillingStatus::NotGenerated,
            items: Vec::new(),
            total: 0,
            invoice_number: None,
            generated_at: None,
            paid_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingItem {
    pub description: String,
    pub amount: i64,
}
