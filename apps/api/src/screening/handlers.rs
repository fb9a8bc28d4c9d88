//! Axum route handlers for the Resume Screening API.

use std::collections::HashSet;
use std::path::Path;

use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::documents::DocumentFormat;
use crate::errors::AppError;
use crate::routes::{csv_response, ExportFormat, ExportQuery};
use crate::screening::pipeline::{
    load_resume_folder, run_screening, ResumeDocument, ScreeningOutcome,
};
use crate::state::AppState;
use crate::tabular::to_csv_string;

pub const MAX_RESUMES: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResumeText {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ScreenRequest {
    pub job_description: String,
    pub resumes: Vec<ResumeText>,
}

#[derive(Debug, Serialize)]
pub struct ScreenResponse {
    #[serde(flatten)]
    pub outcome: ScreeningOutcome,
    /// `reports` indices, best score first, failures last.
    pub ranking: Vec<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resume/screen
///
/// Screens plain-text resumes against a job description.
/// `?format=csv` returns the ranked rows as CSV instead of JSON.
pub async fn handle_screen(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    Json(request): Json<ScreenRequest>,
) -> Result<Response, AppError> {
    validate_batch(&request.job_description, request.resumes.len())?;

    let documents = request
        .resumes
        .into_iter()
        .map(|r| ResumeDocument::from_text(r.filename, r.content))
        .collect();

    let outcome = run_screening(&state.orchestrator, &request.job_description, documents).await;
    respond(outcome, query.format)
}

/// POST /api/v1/resume/upload
///
/// Multipart: a `job_description` text field plus one file part per resume
/// (.pdf, .docx or .txt). Files are staged in a temporary folder and screened
/// in file-name order.
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let staging = tempfile::tempdir().map_err(|e| AppError::Internal(e.into()))?;
    let mut job_description = String::new();
    let mut seen: HashSet<String> = HashSet::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("job_description") {
            job_description = field.text().await?;
            continue;
        }
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let filename = Path::new(&raw_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::Validation(format!("invalid file name '{raw_name}'")))?
            .to_string();
        if DocumentFormat::from_filename(&filename).is_none() {
            return Err(AppError::Validation(format!(
                "unsupported file type '{filename}' (expected .pdf, .docx or .txt)"
            )));
        }
        if !seen.insert(filename.clone()) {
            return Err(AppError::Validation(format!(
                "duplicate file name '{filename}'"
            )));
        }
        if seen.len() > MAX_RESUMES {
            return Err(AppError::Validation(format!(
                "at most {MAX_RESUMES} resumes per request"
            )));
        }

        let bytes = field.bytes().await?;
        tokio::fs::write(staging.path().join(&filename), &bytes)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
    }

    validate_batch(&job_description, seen.len())?;
    info!("Staged {} uploaded resumes", seen.len());

    let folder = staging.path().to_path_buf();
    let documents = tokio::task::spawn_blocking(move || load_resume_folder(&folder))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let outcome = run_screening(&state.orchestrator, &job_description, documents).await;
    drop(staging);
    respond(outcome, query.format)
}

fn validate_batch(job_description: &str, resume_count: usize) -> Result<(), AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    if resume_count == 0 {
        return Err(AppError::Validation("no resumes provided".to_string()));
    }
    if resume_count > MAX_RESUMES {
        return Err(AppError::Validation(format!(
            "at most {MAX_RESUMES} resumes per request"
        )));
    }
    Ok(())
}

fn respond(outcome: ScreeningOutcome, format: ExportFormat) -> Result<Response, AppError> {
    match format {
        ExportFormat::Json => {
            let ranking = outcome.ranking();
            Ok(Json(ScreenResponse { outcome, ranking }).into_response())
        }
        ExportFormat::Csv => {
            let csv = to_csv_string(outcome.csv_rows())?;
            Ok(csv_response("resume_screening_results.csv", csv))
        }
    }
}
