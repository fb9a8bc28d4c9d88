//! Resume Screening Pipeline
//!
//! 1. Parse job description → JobRequirements
//! 2. Extract text per document (blocking pool; failures stay per file)
//! 3. Keyword profile per resume
//! 4. Batch screening through the model
//! 5. One CandidateReport per input document, in input order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{BatchOrchestrator, FailureKind, StructuredResult};
use crate::documents::{self, DocumentError, DocumentFormat};
use crate::tabular::CsvRow;

use super::job_parser::{parse_job_description, JobRequirements};
use super::record::{Recommendation, ScreeningRecord};
use super::resume_parser::{parse_resume_profile, ResumeProfile};
use super::ScreeningRequest;

#[derive(Debug, Clone)]
enum DocumentSource {
    Text(String),
    Upload(Bytes),
    File(PathBuf),
}

/// A resume awaiting screening.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub filename: String,
    source: DocumentSource,
}

impl ResumeDocument {
    /// Resume supplied as plain text.
    pub fn from_text(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source: DocumentSource::Text(content.into()),
        }
    }

    /// Raw uploaded bytes; the format is taken from the file name.
    pub fn from_upload(filename: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            filename: filename.into(),
            source: DocumentSource::Upload(bytes),
        }
    }

    /// A file on disk, read lazily at extraction time.
    pub fn from_path(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            filename,
            source: DocumentSource::File(path),
        }
    }

    /// Blocking.
    fn extract_text(&self) -> Result<String, DocumentError> {
        match &self.source {
            DocumentSource::Text(text) => Ok(text.clone()),
            DocumentSource::Upload(bytes) => {
                let format = DocumentFormat::from_filename(&self.filename)
                    .ok_or_else(|| DocumentError::UnsupportedFormat(self.filename.clone()))?;
                documents::extract_text(format, bytes)
            }
            DocumentSource::File(path) => documents::extract_text_from_path(path),
        }
    }
}

/// The `.pdf`, `.docx` and `.txt` files in `dir`, sorted by name. Blocking.
pub fn load_resume_folder(dir: &Path) -> Result<Vec<ResumeDocument>, DocumentError> {
    Ok(documents::list_documents(dir)?
        .into_iter()
        .map(ResumeDocument::from_path)
        .collect())
}

/// Screening outcome for one input document.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    /// Position in the input.
    pub index: usize,
    pub filename: String,
    pub profile: ResumeProfile,
    pub result: StructuredResult<ScreeningRecord>,
}

impl CandidateReport {
    pub fn record(&self) -> Option<&ScreeningRecord> {
        self.result.record()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningSummary {
    pub total: usize,
    pub screened: usize,
    pub failed: usize,
    pub hire_recommended: usize,
    /// Mean `overall_score` over screened resumes; `None` when nothing was screened.
    pub average_score: Option<f64>,
}

impl ScreeningSummary {
    fn from_reports(reports: &[CandidateReport]) -> Self {
        let records: Vec<&ScreeningRecord> =
            reports.iter().filter_map(CandidateReport::record).collect();
        let average_score = (!records.is_empty()).then(|| {
            records.iter().map(|r| r.overall_score).sum::<f64>() / records.len() as f64
        });

        Self {
            total: reports.len(),
            screened: records.len(),
            failed: reports.len() - records.len(),
            hire_recommended: records
                .iter()
                .filter(|r| r.recommendation == Recommendation::Hire)
                .count(),
            average_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningOutcome {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub requirements: JobRequirements,
    /// Input order.
    pub reports: Vec<CandidateReport>,
    pub summary: ScreeningSummary,
}

impl ScreeningOutcome {
    /// Screened reports by `overall_score` descending, then failures in input order.
    pub fn ranked(&self) -> Vec<&CandidateReport> {
        let mut ranked: Vec<&CandidateReport> = self.reports.iter().collect();
        ranked.sort_by(|a, b| match (a.record(), b.record()) {
            (Some(x), Some(y)) => y.overall_score.total_cmp(&x.overall_score),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        ranked
    }

    /// Positions of `ranked()` within `reports`.
    pub fn ranking(&self) -> Vec<usize> {
        self.ranked().iter().map(|r| r.index).collect()
    }
}

/// Runs the full screening pipeline over `documents` against `job_description`.
pub async fn run_screening(
    orchestrator: &BatchOrchestrator,
    job_description: &str,
    documents: Vec<ResumeDocument>,
) -> ScreeningOutcome {
    info!("Step 1: Parsing job description...");
    let requirements = Arc::new(parse_job_description(job_description));

    info!("Step 2: Extracting text from {} resumes...", documents.len());
    let filenames: Vec<String> = documents.iter().map(|d| d.filename.clone()).collect();
    let texts = extract_all(documents).await;

    info!("Step 3: Screening with the model...");
    let mut profiles = Vec::with_capacity(texts.len());
    let mut requests = Vec::new();
    for text in &texts {
        match text {
            Ok(text) => {
                profiles.push(parse_resume_profile(text));
                requests.push(ScreeningRequest::new(text.clone(), requirements.clone()));
            }
            Err(_) => profiles.push(ResumeProfile::default()),
        }
    }
    let mut screened = orchestrator.run(&requests).await.into_iter();

    info!("Step 4: Compiling results...");
    let reports = texts
        .into_iter()
        .zip(filenames)
        .zip(profiles)
        .enumerate()
        .map(|(index, ((text, filename), profile))| {
            let result = match text {
                Ok(_) => screened.next().unwrap_or_else(|| {
                    StructuredResult::failed(
                        FailureKind::ServiceUnavailable,
                        "no screening result was produced",
                    )
                }),
                Err(reason) => StructuredResult::failed(FailureKind::UnreadableDocument, reason),
            };
            CandidateReport {
                index,
                filename,
                profile,
                result,
            }
        })
        .collect::<Vec<_>>();

    let summary = ScreeningSummary::from_reports(&reports);
    info!(
        "Screening complete: {}/{} screened, {} recommended for hire",
        summary.screened, summary.total, summary.hire_recommended
    );

    ScreeningOutcome {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        requirements: Arc::unwrap_or_clone(requirements),
        reports,
        summary,
    }
}

/// Extracts every document's text on the blocking pool. Index-aligned with the input.
async fn extract_all(documents: Vec<ResumeDocument>) -> Vec<Result<String, String>> {
    let count = documents.len();
    let extracted = tokio::task::spawn_blocking(move || {
        documents
            .iter()
            .map(|doc| {
                doc.extract_text().map_err(|e| {
                    warn!("Error processing {}: {e}", doc.filename);
                    e.to_string()
                })
            })
            .collect::<Vec<_>>()
    })
    .await;

    match extracted {
        Ok(texts) => texts,
        Err(e) => {
            warn!("Document extraction task failed: {e}");
            (0..count)
                .map(|_| Err(format!("document extraction task failed: {e}")))
                .collect()
        }
    }
}

/// Flat CSV row for one candidate.
#[derive(Debug, Serialize)]
pub struct ScreeningCsvRow<'a> {
    pub filename: &'a str,
    pub candidate_email: &'a str,
    pub candidate_phone: &'a str,
    pub extracted_skills: String,
    pub extracted_experience: u32,
    pub extracted_education: String,
    pub status: &'static str,
    pub overall_score: Option<f64>,
    pub recommendation: &'static str,
    pub skills_score: Option<f64>,
    pub experience_score: Option<f64>,
    pub education_score: Option<f64>,
    pub matched_skills: String,
    pub missing_skills: String,
    pub strengths: String,
    pub concerns: String,
    pub error_kind: &'static str,
    pub error: &'a str,
}

impl CsvRow for ScreeningCsvRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "filename",
        "candidate_email",
        "candidate_phone",
        "extracted_skills",
        "extracted_experience",
        "extracted_education",
        "status",
        "overall_score",
        "recommendation",
        "skills_score",
        "experience_score",
        "education_score",
        "matched_skills",
        "missing_skills",
        "strengths",
        "concerns",
        "error_kind",
        "error",
    ];
}

impl<'a> From<&'a CandidateReport> for ScreeningCsvRow<'a> {
    fn from(report: &'a CandidateReport) -> Self {
        let record = report.record();
        let failure = report.result.failure();
        let skills = record.and_then(|r| r.skills_match.as_ref());

        Self {
            filename: &report.filename,
            candidate_email: report.profile.email.as_deref().unwrap_or_default(),
            candidate_phone: report.profile.phone.as_deref().unwrap_or_default(),
            extracted_skills: report.profile.skills.join(", "),
            extracted_experience: report.profile.experience_years,
            extracted_education: report.profile.education.join(", "),
            status: if record.is_some() { "ok" } else { "failed" },
            overall_score: record.map(|r| r.overall_score),
            recommendation: record.map(|r| r.recommendation.as_str()).unwrap_or_default(),
            skills_score: skills.map(|s| s.skills_score),
            experience_score: record
                .and_then(|r| r.experience_match.as_ref())
                .map(|e| e.experience_score),
            education_score: record
                .and_then(|r| r.education_match.as_ref())
                .map(|e| e.education_score),
            matched_skills: skills.map(|s| s.matched_skills.join(", ")).unwrap_or_default(),
            missing_skills: skills.map(|s| s.missing_skills.join(", ")).unwrap_or_default(),
            strengths: record.map(|r| r.strengths.join(", ")).unwrap_or_default(),
            concerns: record.map(|r| r.concerns.join(", ")).unwrap_or_default(),
            error_kind: failure.map(|f| f.kind.as_str()).unwrap_or_default(),
            error: failure.map(|f| f.reason.as_str()).unwrap_or_default(),
        }
    }
}

impl ScreeningOutcome {
    /// CSV rows in ranked order.
    pub fn csv_rows(&self) -> Vec<ScreeningCsvRow<'_>> {
        self.ranked().into_iter().map(ScreeningCsvRow::from).collect()
    }
}
