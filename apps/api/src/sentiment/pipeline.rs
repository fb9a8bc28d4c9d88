//! Sentiment Analysis Pipeline
//!
//! 1. Normalise feedback text (report columns only)
//! 2. Batch sentiment analysis of the original text
//! 3. Per-employee snapshots from successful results
//! 4. Batch attrition prediction per employee

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::{BatchOrchestrator, StructuredResult};
use crate::tabular::CsvRow;

use super::preprocess::{clean_text, remove_stopwords};
use super::record::{AttritionRecord, Level, SentimentLabel, SentimentRecord};
use super::{AttritionRequest, EmployeeSnapshot, SentimentRequest};

/// One feedback row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedbackInput {
    pub text: String,
    #[serde(default)]
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReport {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub text: String,
    pub cleaned_text: String,
    pub processed_text: String,
    pub result: StructuredResult<SentimentRecord>,
}

impl FeedbackReport {
    pub fn record(&self) -> Option<&SentimentRecord> {
        self.result.record()
    }
}

/// Percentages are over analysed rows, 0 when nothing was analysed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub total: usize,
    pub analysed: usize,
    pub failed: usize,
    pub average_sentiment: Option<f64>,
    pub positive_pct: f64,
    pub high_attrition_risk_pct: f64,
    pub low_engagement_pct: f64,
}

impl SentimentSummary {
    fn from_reports(reports: &[FeedbackReport]) -> Self {
        let records: Vec<&SentimentRecord> =
            reports.iter().filter_map(FeedbackReport::record).collect();
        let analysed = records.len();
        let pct = |matching: usize| {
            if analysed == 0 {
                0.0
            } else {
                matching as f64 * 100.0 / analysed as f64
            }
        };

        Self {
            total: reports.len(),
            analysed,
            failed: reports.len() - analysed,
            average_sentiment: (analysed > 0).then(|| {
                records.iter().map(|r| r.sentiment_score).sum::<f64>() / analysed as f64
            }),
            positive_pct: pct(records
                .iter()
                .filter(|r| r.sentiment_label == SentimentLabel::Positive)
                .count()),
            high_attrition_risk_pct: pct(records
                .iter()
                .filter(|r| {
                    r.attrition_risk
                        .as_ref()
                        .is_some_and(|risk| risk.risk_level == Level::High)
                })
                .count()),
            low_engagement_pct: pct(records
                .iter()
                .filter(|r| {
                    r.engagement_level
                        .as_ref()
                        .is_some_and(|e| e.level == Level::Low)
                })
                .count()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttritionPrediction {
    pub employee_id: String,
    pub snapshot: EmployeeSnapshot,
    pub result: StructuredResult<AttritionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentOutcome {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Input order.
    pub reports: Vec<FeedbackReport>,
    pub summary: SentimentSummary,
    /// Empty unless rows carried employee ids.
    pub attrition: Vec<AttritionPrediction>,
}

/// Analyses every feedback row, then predicts attrition for each employee with
/// at least one successfully analysed row.
pub async fn run_sentiment_analysis(
    orchestrator: &BatchOrchestrator,
    inputs: Vec<FeedbackInput>,
) -> SentimentOutcome {
    info!("Step 1: Processing {} feedback rows...", inputs.len());
    let requests: Vec<SentimentRequest> = inputs
        .iter()
        .map(|input| SentimentRequest::new(input.text.clone()))
        .collect();

    info!("Step 2: Running sentiment analysis...");
    let results = orchestrator.run(&requests).await;

    info!("Step 3: Combining results...");
    let reports: Vec<FeedbackReport> = inputs
        .into_iter()
        .zip(results)
        .enumerate()
        .map(|(index, (input, result))| {
            let cleaned_text = clean_text(&input.text);
            let processed_text = remove_stopwords(&cleaned_text);
            FeedbackReport {
                index,
                employee_id: input.employee_id,
                text: input.text,
                cleaned_text,
                processed_text,
                result,
            }
        })
        .collect();
    let summary = SentimentSummary::from_reports(&reports);

    let snapshots = employee_snapshots(&reports);
    let attrition = if snapshots.is_empty() {
        Vec::new()
    } else {
        info!("Step 4: Predicting attrition for {} employees...", snapshots.len());
        predict_attrition(orchestrator, snapshots).await
    };

    SentimentOutcome {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        reports,
        summary,
        attrition,
    }
}

/// Groups successful results by employee id, in first-appearance order.
/// Employees whose rows all failed get no snapshot.
pub fn employee_snapshots(reports: &[FeedbackReport]) -> Vec<EmployeeSnapshot> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&SentimentRecord>> = HashMap::new();

    for report in reports {
        let (Some(id), Some(record)) = (report.employee_id.as_deref(), report.record()) else {
            continue;
        };
        groups
            .entry(id)
            .or_insert_with(|| {
                order.push(id);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .filter_map(|id| {
            let records = groups.get(id)?;
            Some(snapshot_for(id, records))
        })
        .collect()
}

fn snapshot_for(employee_id: &str, records: &[&SentimentRecord]) -> EmployeeSnapshot {
    let count = records.len();
    let avg_sentiment = records.iter().map(|r| r.sentiment_score).sum::<f64>() / count as f64;

    let risk_scores: Vec<f64> = records
        .iter()
        .filter_map(|r| r.attrition_risk.as_ref().map(|risk| risk.risk_score))
        .collect();
    let avg_risk_score = (!risk_scores.is_empty())
        .then(|| risk_scores.iter().sum::<f64>() / risk_scores.len() as f64);

    let levels: Vec<Level> = records
        .iter()
        .filter_map(|r| r.engagement_level.as_ref().map(|e| e.level))
        .collect();

    EmployeeSnapshot {
        employee_id: employee_id.to_string(),
        avg_sentiment,
        avg_risk_score,
        engagement_level: most_frequent(&levels),
        feedback_count: count,
        recent_themes: records
            .iter()
            .flat_map(|r| r.key_themes.iter().cloned())
            .collect(),
        tenure_months: None,
        department: None,
        role_level: None,
    }
}

/// Mode of `levels`; ties go to the level seen first.
fn most_frequent(levels: &[Level]) -> Option<Level> {
    let mut counts: Vec<(Level, usize)> = Vec::new();
    for level in levels {
        match counts.iter_mut().find(|(l, _)| l == level) {
            Some((_, n)) => *n += 1,
            None => counts.push((*level, 1)),
        }
    }
    // max_by_key keeps the last maximum, so scan in reverse
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(level, _)| level)
}

/// Runs attrition prediction for each snapshot; results are index-aligned.
pub async fn predict_attrition(
    orchestrator: &BatchOrchestrator,
    snapshots: Vec<EmployeeSnapshot>,
) -> Vec<AttritionPrediction> {
    let requests: Vec<AttritionRequest> = snapshots.into_iter().map(AttritionRequest::new).collect();
    let results = orchestrator.run(&requests).await;

    requests
        .into_iter()
        .zip(results)
        .map(|(request, result)| AttritionPrediction {
            employee_id: request.snapshot.employee_id.clone(),
            snapshot: request.snapshot,
            result,
        })
        .collect()
}

/// Flat CSV row for one feedback entry. Failed rows carry score 0 and the error.
#[derive(Debug, Serialize)]
pub struct FeedbackCsvRow<'a> {
    pub employee_id: &'a str,
    pub text: &'a str,
    pub cleaned_text: &'a str,
    pub processed_text: &'a str,
    pub status: &'static str,
    pub llm_sentiment_score: f64,
    pub llm_sentiment_label: &'static str,
    pub confidence: Option<f64>,
    pub attrition_risk_level: &'static str,
    pub attrition_risk_score: Option<f64>,
    pub engagement_level: &'static str,
    pub key_themes: String,
    pub error_kind: &'static str,
    pub error: &'a str,
}

impl CsvRow for FeedbackCsvRow<'_> {
    const HEADERS: &'static [&'static str] = &[
        "employee_id",
        "text",
        "cleaned_text",
        "processed_text",
        "status",
        "llm_sentiment_score",
        "llm_sentiment_label",
        "confidence",
        "attrition_risk_level",
        "attrition_risk_score",
        "engagement_level",
        "key_themes",
        "error_kind",
        "error",
    ];
}

impl<'a> From<&'a FeedbackReport> for FeedbackCsvRow<'a> {
    fn from(report: &'a FeedbackReport) -> Self {
        let record = report.record();
        let failure = report.result.failure();
        let risk = record.and_then(|r| r.attrition_risk.as_ref());

        Self {
            employee_id: report.employee_id.as_deref().unwrap_or_default(),
            text: &report.text,
            cleaned_text: &report.cleaned_text,
            processed_text: &report.processed_text,
            status: if record.is_some() { "ok" } else { "failed" },
            llm_sentiment_score: record.map(|r| r.sentiment_score).unwrap_or(0.0),
            llm_sentiment_label: record
                .map(|r| r.sentiment_label.as_str())
                .unwrap_or_default(),
            confidence: record.and_then(|r| r.confidence),
            attrition_risk_level: risk.map(|r| r.risk_level.as_str()).unwrap_or_default(),
            attrition_risk_score: risk.map(|r| r.risk_score),
            engagement_level: record
                .and_then(|r| r.engagement_level.as_ref())
                .map(|e| e.level.as_str())
                .unwrap_or_default(),
            key_themes: record.map(|r| r.key_themes.join(", ")).unwrap_or_default(),
            error_kind: failure.map(|f| f.kind.as_str()).unwrap_or_default(),
            error: failure.map(|f| f.reason.as_str()).unwrap_or_default(),
        }
    }
}

impl SentimentOutcome {
    pub fn csv_rows(&self) -> Vec<FeedbackCsvRow<'_>> {
        self.reports.iter().map(FeedbackCsvRow::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::{Analyzer, AnalyzerSettings, FailureKind};
    use crate::llm_client::fake::FnGenerator;
    use crate::llm_client::LlmError;
    use crate::sentiment::record::EngagementLevel;
    use crate::tabular::to_csv_string;

    /// Sentiment replies keyed on words in the feedback; attrition replies on the employee id.
    fn orchestrator() -> BatchOrchestrator {
        let generator = FnGenerator::new(|prompt| {
            if prompt.contains("expert HR data scientist") {
                return if prompt.contains("Employee ID: e2") {
                    Err(LlmError::Unavailable("connection reset".into()))
                } else {
                    Ok(r#"{"attrition_probability": 0.7, "risk_category": "HIGH", "priority_level": "URGENT"}"#.into())
                };
            }
            let reply = if prompt.contains("love") {
                r#"{"sentiment_score": 0.8, "sentiment_label": "POSITIVE", "key_themes": ["team"],
                    "attrition_risk": {"risk_level": "LOW", "risk_score": 0.1},
                    "engagement_level": {"level": "HIGH", "score": 0.9}}"#
            } else if prompt.contains("leaving") {
                r#"{"sentiment_score": -0.6, "sentiment_label": "NEGATIVE", "key_themes": ["pay"],
                    "attrition_risk": {"risk_level": "HIGH", "risk_score": 0.9},
                    "engagement_level": {"level": "LOW", "score": 0.2}}"#
            } else if prompt.contains("meh") {
                r#"{"sentiment_score": 0.1, "sentiment_label": "NEUTRAL",
                    "engagement_level": {"level": "LOW", "score": 0.4}}"#
            } else {
                "I cannot process this."
            };
            Ok(reply.to_string())
        });
        BatchOrchestrator::new(
            Analyzer::new(Arc::new(generator), AnalyzerSettings::default()),
            1,
        )
    }

    fn row(text: &str, id: Option<&str>) -> FeedbackInput {
        FeedbackInput {
            text: text.to_string(),
            employee_id: id.map(str::to_string),
        }
    }

    fn sentiment(score: f64, level: Option<Level>, themes: &[&str]) -> SentimentRecord {
        SentimentRecord {
            sentiment_score: score,
            sentiment_label: SentimentLabel::Neutral,
            confidence: None,
            key_themes: themes.iter().map(|t| t.to_string()).collect(),
            emotional_indicators: vec![],
            attrition_risk: None,
            engagement_level: level.map(|level| EngagementLevel {
                level,
                score: 0.5,
                positive_indicators: vec![],
                negative_indicators: vec![],
            }),
            actionable_insights: vec![],
        }
    }

    fn report(index: usize, id: Option<&str>, result: StructuredResult<SentimentRecord>) -> FeedbackReport {
        FeedbackReport {
            index,
            employee_id: id.map(str::to_string),
            text: String::new(),
            cleaned_text: String::new(),
            processed_text: String::new(),
            result,
        }
    }

    #[tokio::test]
    async fn test_reports_are_index_aligned_with_cleaning() {
        let outcome = run_sentiment_analysis(
            &orchestrator(),
            vec![
                row("I LOVE my team!", None),
                row("", None),
                row("garbled ???", None),
            ],
        )
        .await;

        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.reports[0].cleaned_text, "i love my team");
        assert_eq!(outcome.reports[0].processed_text, "love team");
        assert!(outcome.reports[0].result.is_ok());
        assert_eq!(
            outcome.reports[1].result.failure().unwrap().kind,
            FailureKind::EmptyInput
        );
        assert_eq!(
            outcome.reports[2].result.failure().unwrap().kind,
            FailureKind::MalformedReply
        );
        assert!(outcome.attrition.is_empty());
    }

    #[tokio::test]
    async fn test_model_sees_original_text() {
        let generator = Arc::new(FnGenerator::new(|prompt| {
            assert!(prompt.contains("\"I LOVE my team!\""));
            Ok(r#"{"sentiment_score": 0.5, "sentiment_label": "POSITIVE"}"#.to_string())
        }));
        let orchestrator = BatchOrchestrator::new(
            Analyzer::new(generator.clone(), AnalyzerSettings::default()),
            1,
        );
        let outcome = run_sentiment_analysis(&orchestrator, vec![row("I LOVE my team!", None)]).await;
        assert!(outcome.reports[0].result.is_ok());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_summary_over_analysed_rows() {
        let outcome = run_sentiment_analysis(
            &orchestrator(),
            vec![
                row("love it", None),
                row("thinking of leaving", None),
                row("meh", None),
                row("???", None),
            ],
        )
        .await;

        let summary = &outcome.summary;
        assert_eq!(summary.total, 4);
        assert_eq!(summary.analysed, 3);
        assert_eq!(summary.failed, 1);
        let average = summary.average_sentiment.unwrap();
        assert!((average - 0.1).abs() < 1e-9);
        assert!((summary.positive_pct - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.high_attrition_risk_pct - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.low_engagement_pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_attrition_runs_per_employee() {
        let outcome = run_sentiment_analysis(
            &orchestrator(),
            vec![
                row("love the team", Some("e1")),
                row("thinking of leaving", Some("e2")),
                row("thinking of leaving", Some("e1")),
                row("???", Some("e3")),
            ],
        )
        .await;

        let ids: Vec<&str> = outcome
            .attrition
            .iter()
            .map(|p| p.employee_id.as_str())
            .collect();
        // e3 had no successful rows
        assert_eq!(ids, vec!["e1", "e2"]);

        let e1 = &outcome.attrition[0];
        assert_eq!(e1.snapshot.feedback_count, 2);
        assert!((e1.snapshot.avg_sentiment - 0.1).abs() < 1e-9);
        assert!((e1.snapshot.avg_risk_score.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(e1.snapshot.recent_themes, vec!["team", "pay"]);
        assert_eq!(e1.result.record().unwrap().attrition_probability, 0.7);

        assert_eq!(
            outcome.attrition[1].result.failure().unwrap().kind,
            FailureKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_engagement_mode_ties_go_to_first_seen() {
        let reports = vec![
            report(0, Some("a"), StructuredResult::Ok { record: sentiment(0.0, Some(Level::Low), &[]) }),
            report(1, Some("a"), StructuredResult::Ok { record: sentiment(0.0, Some(Level::High), &[]) }),
            report(2, Some("b"), StructuredResult::Ok { record: sentiment(0.0, Some(Level::High), &[]) }),
            report(3, Some("b"), StructuredResult::Ok { record: sentiment(0.0, Some(Level::Low), &[]) }),
            report(4, Some("b"), StructuredResult::Ok { record: sentiment(0.0, Some(Level::Low), &[]) }),
            report(5, Some("c"), StructuredResult::Ok { record: sentiment(0.0, None, &[]) }),
        ];
        let snapshots = employee_snapshots(&reports);

        assert_eq!(snapshots[0].engagement_level, Some(Level::Low));
        assert_eq!(snapshots[1].engagement_level, Some(Level::Low));
        assert_eq!(snapshots[2].engagement_level, None);
        assert_eq!(snapshots[2].avg_risk_score, None);
    }

    #[test]
    fn test_rows_without_id_or_with_failures_are_not_grouped() {
        let reports = vec![
            report(0, None, StructuredResult::Ok { record: sentiment(0.5, None, &[]) }),
            report(1, Some("x"), StructuredResult::failed(FailureKind::Timeout, "slow")),
        ];
        assert!(employee_snapshots(&reports).is_empty());
    }

    #[tokio::test]
    async fn test_failed_csv_row_has_zero_score_and_error() {
        let outcome = run_sentiment_analysis(&orchestrator(), vec![row("???", Some("z"))]).await;
        let rows = outcome.csv_rows();

        assert_eq!(rows[0].status, "failed");
        assert_eq!(rows[0].llm_sentiment_score, 0.0);
        assert_eq!(rows[0].error_kind, "MALFORMED_REPLY");
        assert_eq!(rows[0].employee_id, "z");
    }

    #[tokio::test]
    async fn test_csv_header_matches_declared_columns() {
        let outcome = run_sentiment_analysis(
            &orchestrator(),
            vec![row("great team", Some("e1")), row("???", None)],
        )
        .await;
        let csv = to_csv_string(outcome.csv_rows()).unwrap();
        assert_eq!(csv.lines().next(), Some(FeedbackCsvRow::HEADERS.join(",").as_str()));

        let empty = run_sentiment_analysis(&orchestrator(), Vec::new()).await;
        let csv = to_csv_string(empty.csv_rows()).unwrap();
        assert_eq!(csv, format!("{}\n", FeedbackCsvRow::HEADERS.join(",")));
    }
}
