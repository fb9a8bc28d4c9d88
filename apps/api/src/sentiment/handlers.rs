//! Axum route handlers for the Sentiment Analysis API.

use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::routes::{csv_response, ExportFormat, ExportQuery};
use crate::sentiment::pipeline::{
    predict_attrition, run_sentiment_analysis, AttritionPrediction, FeedbackInput,
    SentimentOutcome,
};
use crate::sentiment::EmployeeSnapshot;
use crate::state::AppState;
use crate::tabular::{load_feedback, to_csv_string, FeedbackFormat};

pub const MAX_TEXTS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub employee_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AttritionBatchRequest {
    pub employees: Vec<EmployeeSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct AttritionBatchResponse {
    /// Index-aligned with the request's `employees`.
    pub predictions: Vec<AttritionPrediction>,
}

/// POST /api/v1/sentiment/analyze
///
/// Analyses each text; when `employee_ids` is given (one per text), also predicts
/// attrition per employee.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, AppError> {
    validate_count(request.texts.len())?;

    let inputs: Vec<FeedbackInput> = match request.employee_ids {
        Some(ids) => {
            if ids.len() != request.texts.len() {
                return Err(AppError::Validation(format!(
                    "employee_ids has {} entries but texts has {}",
                    ids.len(),
                    request.texts.len()
                )));
            }
            request
                .texts
                .into_iter()
                .zip(ids)
                .map(|(text, id)| FeedbackInput {
                    text,
                    employee_id: Some(id).filter(|id| !id.trim().is_empty()),
                })
                .collect()
        }
        None => request
            .texts
            .into_iter()
            .map(|text| FeedbackInput {
                text,
                employee_id: None,
            })
            .collect(),
    };

    let outcome = run_sentiment_analysis(&state.orchestrator, inputs).await;
    respond(outcome, query.format)
}

/// POST /api/v1/sentiment/attrition
///
/// Predicts attrition for already-aggregated employee snapshots.
pub async fn handle_attrition(
    State(state): State<AppState>,
    Json(request): Json<AttritionBatchRequest>,
) -> Result<Json<AttritionBatchResponse>, AppError> {
    validate_count(request.employees.len())?;
    if let Some(blank) = request
        .employees
        .iter()
        .position(|e| e.employee_id.trim().is_empty())
    {
        return Err(AppError::Validation(format!(
            "employees[{blank}].employee_id cannot be empty"
        )));
    }

    let predictions = predict_attrition(&state.orchestrator, request.employees).await;
    Ok(Json(AttritionBatchResponse { predictions }))
}

/// POST /api/v1/sentiment/upload
///
/// Multipart: a `.csv` or `.xlsx` `file` and the `text_column` holding feedback text.
/// An `employee_id` column, when present, enables attrition prediction.
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = None;
    let mut text_column = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("feedback.csv").to_string();
                let format = FeedbackFormat::from_filename(&filename)?;
                upload = Some((format, field.bytes().await?));
            }
            Some("text_column") => text_column = Some(field.text().await?),
            _ => {}
        }
    }

    let (format, bytes) =
        upload.ok_or_else(|| AppError::Validation("missing 'file' part".to_string()))?;
    let text_column = text_column
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::Validation("missing 'text_column' field".to_string()))?;

    let inputs = load_feedback(&bytes, format, &text_column)?;
    validate_count(inputs.len())?;

    let outcome = run_sentiment_analysis(&state.orchestrator, inputs).await;
    respond(outcome, query.format)
}

fn validate_count(count: usize) -> Result<(), AppError> {
    if count == 0 {
        return Err(AppError::Validation("no feedback provided".to_string()));
    }
    if count > MAX_TEXTS {
        return Err(AppError::Validation(format!(
            "at most {MAX_TEXTS} items per request"
        )));
    }
    Ok(())
}

fn respond(outcome: SentimentOutcome, format: ExportFormat) -> Result<Response, AppError> {
    match format {
        ExportFormat::Json => Ok(Json(outcome).into_response()),
        ExportFormat::Csv => {
            let csv = to_csv_string(outcome.csv_rows())?;
            Ok(csv_response("sentiment_analysis_results.csv", csv))
        }
    }
}
