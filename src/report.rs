//! Lab report PDF rendering via `printpdf`.
//!
//! Reports are written under the configured reports directory and the
//! file name is stored on the test request.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Utc;
use printpdf::*;

use crate::models::{Patient, TestRequest};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("PDF rendering failed: {0}")]
    Render(String),
    #[error("Cannot write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid report file name")]
    InvalidFileName,
}

/// Everything the report shows beyond the request itself.
pub struct ReportContext<'a> {
    pub patient: &'a Patient,
    pub doctor_name: Option<&'a str>,
    pub center_name: Option<&'a str>,
}

const LINE: f32 = 4.5;
const BOTTOM_MARGIN: f32 = 20.0;

/// Render the lab report for a request. Returns PDF bytes.
pub fn render_report(req: &TestRequest, ctx: &ReportContext<'_>) -> Result<Vec<u8>, ReportError> {
    let title = format!("Lab Report - {}", req.test_type);
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let mut layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(format!("font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(format!("font error: {e}")))?;

    let mut y = 280.0_f32;

    let header = ctx.center_name.unwrap_or("AllerCare");
    layer.use_text(header, 16.0, Mm(20.0), Mm(y), &bold);
    y -= 8.0;
    layer.use_text("LABORATORY TEST REPORT", 12.0, Mm(20.0), Mm(y), &bold);
    y -= 10.0;

    let patient = ctx.patient;
    let details = [
        format!("Patient: {}", patient.name),
        format!("Age / Gender: {} / {}", patient.age, patient.gender),
        format!("Phone: {}", patient.phone),
        format!("Referring doctor: {}", ctx.doctor_name.unwrap_or("-")),
        format!("Test: {} ({})", req.test_type, req.urgency),
        format!("Request ID: {}", req.id),
        format!(
            "Sample collected: {}",
            req.sample_collected_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into())
        ),
        format!("Report date: {}", Utc::now().format("%Y-%m-%d")),
    ];
    for line in &details {
        layer.use_text(line, 10.0, Mm(20.0), Mm(y), &font);
        y -= 5.5;
    }
    y -= 4.0;

    let sections = [
        ("DESCRIPTION", req.test_description.as_deref()),
        ("RESULTS", req.results.results.as_deref()),
        ("NOTES", req.results.result_notes.as_deref()),
        ("CONCLUSION", req.results.conclusion.as_deref()),
        ("RECOMMENDATIONS", req.results.recommendations.as_deref()),
    ];
    for (heading, body) in sections {
        let Some(body) = body.filter(|b| !b.trim().is_empty()) else {
            continue;
        };
        if y < BOTTOM_MARGIN + 12.0 {
            layer = new_page(&doc);
            y = 280.0;
        }
        layer.use_text(heading, 11.0, Mm(20.0), Mm(y), &bold);
        y -= 6.0;
        for paragraph in body.lines() {
            for line in wrap_text(paragraph, 90) {
                if y < BOTTOM_MARGIN {
                    layer = new_page(&doc);
                    y = 280.0;
                }
                layer.use_text(&line, 9.0, Mm(25.0), Mm(y), &font);
                y -= LINE;
            }
        }
        y -= 4.0;
    }

    if y < BOTTOM_MARGIN + 8.0 {
        layer = new_page(&doc);
        y = 280.0;
    }
    y -= 6.0;
    layer.use_text(
        "This report is electronically generated and valid without signature.",
        8.0,
        Mm(20.0),
        Mm(y),
        &font,
    );

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Render(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Render(format!("buffer error: {e}")))
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
    doc.get_page(page).get_layer(layer)
}

/// `report-<request id>-<unix millis>.pdf`
pub fn report_file_name(req: &TestRequest) -> String {
    format!("report-{}-{}.pdf", req.id, Utc::now().timestamp_millis())
}

/// Render and write the report. Returns the file name relative to `dir`.
pub fn write_report(
    dir: &Path,
    req: &TestRequest,
    ctx: &ReportContext<'_>,
) -> Result<String, ReportError> {
    let bytes = render_report(req, ctx)?;
    std::fs::create_dir_all(dir)?;
    let name = report_file_name(req);
    std::fs::write(dir.join(&name), bytes)?;
    tracing::info!(request_id = %req.id, file = %name, "Lab report written");
    Ok(name)
}

/// Resolve a stored report name inside `dir`, refusing anything that
/// is not a bare file name.
pub fn report_path(dir: &Path, name: &str) -> Result<PathBuf, ReportError> {
    let candidate = Path::new(name);
    match candidate.file_name() {
        Some(file) if file == candidate.as_os_str() && name.ends_with(".pdf") => {
            Ok(dir.join(file))
        }
        _ => Err(ReportError::InvalidFileName),
    }
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Gender, TestRequestStatus, Urgency};
    use crate::models::{Billing, CollectionSchedule, TestResults};
    use uuid::Uuid;

    fn patient() -> Patient {
        let now = Utc::now();
        Patient {
            id: Uuid::new_v4(),
            name: "Asha Verma".into(),
            gender: Gender::Female,
            age: 34,
            phone: "9876543210".into(),
            email: None,
            address: None,
            center_id: None,
            assigned_doctor_id: None,
            registered_by: None,
            tests: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn request(patient_id: Uuid) -> TestRequest {
        let now = Utc::now();
        TestRequest {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            patient_id,
            center_id: None,
            test_type: "Skin prick test".into(),
            test_description: Some("Standard inhalant panel".into()),
            urgency: Urgency::Normal,
            notes: None,
            status: TestRequestStatus::TestingCompleted,
            assigned_lab_staff_id: None,
            collection: CollectionSchedule::default(),
            sample_collected_at: Some(now),
            testing_started_at: Some(now),
            testing_completed_at: Some(now),
            results: TestResults {
                results: Some("House dust mite: 6mm wheal. ".repeat(40)),
                result_notes: None,
                conclusion: Some("Sensitised to dust mite".into()),
                recommendations: Some("Avoidance measures, antihistamine as needed".into()),
            },
            report_file: None,
            report_generated_at: None,
            report_sent_at: None,
            billing: Billing::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn render_produces_pdf_bytes() {
        let p = patient();
        let req = request(p.id);
        let ctx = ReportContext {
            patient: &p,
            doctor_name: Some("Dr. Rao"),
            center_name: Some("City Allergy Centre"),
        };
        let bytes = render_report(&req, &ctx).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn write_report_creates_named_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("reports");
        let p = patient();
        let req = request(p.id);
        let ctx = ReportContext { patient: &p, doctor_name: None, center_name: None };

        let name = write_report(&dir, &req, &ctx).unwrap();
        assert!(name.starts_with(&format!("report-{}-", req.id)));
        assert!(name.ends_with(".pdf"));
        let bytes = std::fs::read(dir.join(&name)).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn report_path_rejects_traversal() {
        let dir = Path::new("/srv/reports");
        assert_eq!(
            report_path(dir, "report-x-1.pdf").unwrap(),
            PathBuf::from("/srv/reports/report-x-1.pdf")
        );
        assert!(report_path(dir, "../secret.pdf").is_err());
        assert!(report_path(dir, "/etc/passwd").is_err());
        assert!(report_path(dir, "notes.txt").is_err());
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
