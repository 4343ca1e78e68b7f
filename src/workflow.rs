//! Test-request status progression and billing.
//!
//! Every workflow step is checked against a fixed transition table
//! before anything is written. A rejected step leaves the record
//! untouched. Callers persist the mutated record afterwards, guarded on
//! the status (or billing status) it was loaded with, so a step computed
//! from a stale copy is refused instead of overwriting a newer one.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::enums::{BillingStatus, TestRequestStatus};
use crate::models::{BillingItem, CollectionSchedule, TestRequest, TestResults};

use TestRequestStatus as S;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Cannot move test request from {from} to {to}")]
    InvalidTransition {
        from: TestRequestStatus,
        to: TestRequestStatus,
    },
    #[error("Report cannot be sent before the bill is paid")]
    BillNotPaid,
    #[error("Bill has already been paid")]
    BillAlreadyPaid,
    #[error("Bill has not been generated")]
    BillNotGenerated,
    #[error("Test request is cancelled")]
    RequestCancelled,
    #[error("Invalid bill: {0}")]
    InvalidBill(String),
}

/// Source states from which `target` may be entered.
pub fn allowed_sources(target: TestRequestStatus) -> &'static [TestRequestStatus] {
    match target {
        S::Pending => &[],
        S::Assigned => &[S::Pending, S::Assigned, S::SampleCollectionScheduled],
        S::SampleCollectionScheduled => &[S::Assigned, S::SampleCollectionScheduled],
        S::SampleCollected => &[S::SampleCollectionScheduled],
        S::InLabTesting => &[S::SampleCollected],
        S::TestingCompleted => &[S::InLabTesting, S::TestingCompleted],
        S::ReportGenerated => &[S::TestingCompleted, S::ReportGenerated],
        S::ReportSent => &[S::ReportGenerated],
        S::Completed => &[S::ReportSent],
        S::Cancelled => &[
            S::Pending,
            S::Assigned,
            S::SampleCollectionScheduled,
            S::SampleCollected,
            S::InLabTesting,
            S::TestingCompleted,
            S::ReportGenerated,
            S::ReportSent,
        ],
    }
}

pub fn can_transition(from: TestRequestStatus, to: TestRequestStatus) -> bool {
    allowed_sources(to).contains(&from)
}

fn transition(
    req: &mut TestRequest,
    to: TestRequestStatus,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    ensure_transition(req, to)?;
    req.status = to;
    req.updated_at = now;
    Ok(())
}

fn ensure_transition(req: &TestRequest, to: TestRequestStatus) -> Result<(), WorkflowError> {
    if can_transition(req.status, to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            from: req.status,
            to,
        })
    }
}

pub fn assign(
    req: &mut TestRequest,
    lab_staff_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    transition(req, S::Assigned, now)?;
    req.assigned_lab_staff_id = Some(lab_staff_id);
    Ok(())
}

pub fn schedule_collection(
    req: &mut TestRequest,
    schedule: CollectionSchedule,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    transition(req, S::SampleCollectionScheduled, now)?;
    req.collection = schedule;
    Ok(())
}

pub fn collect_sample(req: &mut TestRequest, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    transition(req, S::SampleCollected, now)?;
    req.sample_collected_at = Some(now);
    Ok(())
}

pub fn start_testing(req: &mut TestRequest, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    transition(req, S::InLabTesting, now)?;
    req.testing_started_at = Some(now);
    Ok(())
}

pub fn complete_testing(
    req: &mut TestRequest,
    results: TestResults,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    transition(req, S::TestingCompleted, now)?;
    req.results = results;
    req.testing_completed_at = Some(now);
    Ok(())
}

/// Check that a report may be generated, before rendering any file.
pub fn ensure_report_allowed(req: &TestRequest) -> Result<(), WorkflowError> {
    ensure_transition(req, S::ReportGenerated)
}

pub fn record_report(
    req: &mut TestRequest,
    report_file: String,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    transition(req, S::ReportGenerated, now)?;
    req.report_file = Some(report_file);
    req.report_generated_at = Some(now);
    Ok(())
}

pub fn send_report(req: &mut TestRequest, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    ensure_transition(req, S::ReportSent)?;
    if req.billing.status != BillingStatus::Paid {
        return Err(WorkflowError::BillNotPaid);
    }
    transition(req, S::ReportSent, now)?;
    req.report_sent_at = Some(now);
    Ok(())
}

pub fn complete(req: &mut TestRequest, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    transition(req, S::Completed, now)
}

pub fn cancel(
    req: &mut TestRequest,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    transition(req, S::Cancelled, now)?;
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        req.notes = Some(match req.notes.take() {
            Some(existing) => format!("{existing}\nCancelled: {reason}"),
            None => format!("Cancelled: {reason}"),
        });
    }
    Ok(())
}

// ── Billing ──────────────────────────────────────────────

/// Generate (or regenerate) the bill for a request.
pub fn generate_bill(
    req: &mut TestRequest,
    items: Vec<BillingItem>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if req.status == S::Cancelled {
        return Err(WorkflowError::RequestCancelled);
    }
    if req.billing.status == BillingStatus::Paid {
        return Err(WorkflowError::BillAlreadyPaid);
    }
    if items.is_empty() {
        return Err(WorkflowError::InvalidBill("at least one item is required".into()));
    }

    let mut total: i64 = 0;
    for item in &items {
        if item.description.trim().is_empty() {
            return Err(WorkflowError::InvalidBill("item description is required".into()));
        }
        if item.amount <= 0 {
            return Err(WorkflowError::InvalidBill(format!(
                "amount for '{}' must be positive",
                item.description
            )));
        }
        total = total
            .checked_add(item.amount)
            .ok_or_else(|| WorkflowError::InvalidBill("total overflows".into()))?;
    }

    req.billing.items = items;
    req.billing.total = total;
    req.billing.status = BillingStatus::Generated;
    req.billing.invoice_number = Some(invoice_number(&req.id, now));
    req.billing.generated_at = Some(now);
    req.updated_at = now;
    Ok(())
}

pub fn mark_bill_paid(req: &mut TestRequest, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    match req.billing.status {
        BillingStatus::Paid => Err(WorkflowError::BillAlreadyPaid),
        BillingStatus::NotGenerated => Err(WorkflowError::BillNotGenerated),
        BillingStatus::Generated => {
            req.billing.status = BillingStatus::Paid;
            req.billing.paid_at = Some(now);
            req.updated_at = now;
            Ok(())
        }
    }
}

/// `INV-<yyyymmdd>-<first 8 hex of the request id>`, upper-cased.
pub fn invoice_number(request_id: &Uuid, now: DateTime<Utc>) -> String {
    let simple = request_id.simple().to_string();
    format!(
        "INV-{}-{}",
        now.format("%Y%m%d"),
        simple[..8].to_uppercase()
    )
}
