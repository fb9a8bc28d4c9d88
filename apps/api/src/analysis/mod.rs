//! Analysis core: one model-backed analysis per request, failures captured per item.
//!
//! Flow for a single request:
//! empty-input check → build prompt → call model (deadline + retry policy) → extract record.
//!
//! Nothing in here returns `Err` to the caller: every outcome is a [`StructuredResult`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::extract::{extract_record, ExtractError, ExtractionStrategy, StructuredRecord};
use crate::llm_client::prompts::PromptOptions;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::TextGenerator;

pub mod batch;

pub use batch::BatchOrchestrator;

/// Which analysis a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ResumeScreening,
    SentimentAnalysis,
    AttritionPrediction,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeScreening => "resume_screening",
            Self::SentimentAnalysis => "sentiment_analysis",
            Self::AttritionPrediction => "attrition_prediction",
        }
    }
}

/// Failure taxonomy for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    EmptyInput,
    ServiceUnavailable,
    MalformedReply,
    InvalidStructure,
    Timeout,
    /// Text could not be extracted from an uploaded document.
    UnreadableDocument,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::MalformedReply => "MALFORMED_REPLY",
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::Timeout => "TIMEOUT",
            Self::UnreadableDocument => "UNREADABLE_DOCUMENT",
        }
    }
}

/// A tagged, human-readable per-item failure. `reason` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}: {reason}", kind.as_str())]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            kind.as_str().to_lowercase().replace('_', " ")
        } else {
            reason
        };
        Self { kind, reason }
    }
}

impl From<ExtractError> for Failure {
    fn from(err: ExtractError) -> Self {
        let kind = match err {
            ExtractError::Malformed(_) => FailureKind::MalformedReply,
            ExtractError::Invalid(_) => FailureKind::InvalidStructure,
        };
        Failure::new(kind, err.to_string())
    }
}

/// Outcome of one analysis: a complete validated record, or a tagged failure.
/// There is no partial success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructuredResult<T> {
    Ok { record: T },
    Failed(Failure),
}

impl<T: StructuredRecord> StructuredResult<T> {
    /// Extracts a record from a raw model reply. Pure: same reply, same result.
    pub fn from_reply(reply: &str, strategy: ExtractionStrategy) -> Self {
        match extract_record(reply, strategy) {
            Ok(record) => Self::Ok { record },
            Err(err) => Self::Failed(err.into()),
        }
    }
}

impl<T> StructuredResult<T> {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed(Failure::new(kind, reason))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Ok { record } => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Ok { .. } => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// An immutable analysis input: subject text plus whatever task context the prompt needs.
pub trait AnalysisRequest: Send + Sync {
    type Record: StructuredRecord + Send;

    const KIND: TaskKind;

    /// The text being analysed. Blank subjects fail with `EmptyInput` before any call.
    fn subject(&self) -> &str;

    /// Deterministic prompt for this request.
    fn build_prompt(&self, options: &PromptOptions) -> String;
}

/// Knobs for [`Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub retry: RetryPolicy,
    /// Wall-clock bound on each model call; expiry counts as a `Timeout` failure.
    pub call_timeout: Duration,
    pub strategy: ExtractionStrategy,
    pub prompt: PromptOptions,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::no_retry(),
            call_timeout: Duration::from_secs(60),
            strategy: ExtractionStrategy::Outermost,
            prompt: PromptOptions::default(),
        }
    }
}

/// Runs single analyses against one shared text generator.
#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: AnalyzerSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Analyses one request. Never fails: errors come back as `StructuredResult::Failed`.
    pub async fn analyze<R: AnalysisRequest>(&self, request: &R) -> StructuredResult<R::Record> {
        if request.subject().trim().is_empty() {
            return StructuredResult::failed(
                FailureKind::EmptyInput,
                format!("{} input text is empty", R::KIND.as_str()),
            );
        }

        let prompt = request.build_prompt(&self.settings.prompt);

        let reply = match self.call_with_retry(R::KIND, &prompt).await {
            Ok(reply) => reply,
            Err(failure) => return StructuredResult::Failed(failure),
        };

        let result = StructuredResult::from_reply(&reply, self.settings.strategy);
        if let Some(failure) = result.failure() {
            debug!(task = R::KIND.as_str(), "Extraction failed: {failure}");
        }
        result
    }

    /// Calls the model under the configured deadline, retrying transient failures
    /// per the retry policy. Extraction problems are never retried here.
    async fn call_with_retry(&self, kind: TaskKind, prompt: &str) -> Result<String, Failure> {
        let policy = self.settings.retry;
        let mut attempt = 1;

        loop {
            let call = self.generator.generate(prompt);
            let (failure, transient) =
                match tokio::time::timeout(self.settings.call_timeout, call).await {
                    Ok(Ok(reply)) => return Ok(reply),
                    Ok(Err(err)) => {
                        let transient = err.is_transient();
                        (
                            Failure::new(FailureKind::ServiceUnavailable, err.to_string()),
                            transient,
                        )
                    }
                    Err(_) => (
                        Failure::new(
                            FailureKind::Timeout,
                            format!(
                                "model call exceeded {}ms",
                                self.settings.call_timeout.as_millis()
                            ),
                        ),
                        true,
                    ),
                };

            if !transient || !policy.allows_another(attempt) {
                if attempt > 1 {
                    return Err(Failure::new(
                        failure.kind,
                        format!("{} (after {attempt} attempts)", failure.reason),
                    ));
                }
                return Err(failure);
            }

            let delay = policy.delay_after(attempt);
            warn!(
                task = kind.as_str(),
                "Model call attempt {}/{} failed ({}), retrying after {}ms...",
                attempt,
                policy.attempts(),
                failure,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{EchoRecord, EchoRequest};
    use super::*;
    use crate::llm_client::fake::{FnGenerator, HangingGenerator, ScriptedGenerator};
    use crate::llm_client::LlmError;

    fn analyzer_with(generator: Arc<dyn TextGenerator>, settings: AnalyzerSettings) -> Analyzer {
        Analyzer::new(generator, settings)
    }

    #[tokio::test]
    async fn test_successful_reply_yields_record() {
        let generator = Arc::new(FnGenerator::new(|_| Ok("Result: {\"value\": 42}".to_string())));
        let analyzer = analyzer_with(generator.clone(), AnalyzerSettings::default());

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;

        assert_eq!(
            result,
            StructuredResult::Ok {
                record: EchoRecord { value: 42.0 }
            }
        );
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_subject_fails_without_calling_model() {
        let generator = Arc::new(FnGenerator::new(|_| Ok("{\"value\": 1}".to_string())));
        let analyzer = analyzer_with(generator.clone(), AnalyzerSettings::default());

        let result = analyzer.analyze(&EchoRequest("   \n".into())).await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::EmptyInput);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_service_error_is_captured() {
        let generator = Arc::new(FnGenerator::new(|_| {
            Err(LlmError::Unavailable("connection reset".into()))
        }));
        let analyzer = analyzer_with(generator, AnalyzerSettings::default());

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;
        let failure = result.failure().unwrap();

        assert_eq!(failure.kind, FailureKind::ServiceUnavailable);
        assert!(failure.reason.contains("connection reset"));
        assert!(result.record().is_none());
    }

    #[tokio::test]
    async fn test_malformed_reply_is_tagged() {
        let generator = Arc::new(FnGenerator::new(|_| Ok("I cannot process this.".to_string())));
        let analyzer = analyzer_with(generator, AnalyzerSettings::default());

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;
        assert_eq!(result.failure().unwrap().kind, FailureKind::MalformedReply);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        let settings = AnalyzerSettings {
            call_timeout: Duration::from_secs(5),
            ..AnalyzerSettings::default()
        };
        let analyzer = analyzer_with(Arc::new(HangingGenerator), settings);

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;
        let failure = result.failure().unwrap();

        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.reason.contains("5000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_by_default() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            Ok("{\"value\": 1}".into()),
        ]));
        let analyzer = analyzer_with(generator.clone(), AnalyzerSettings::default());

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::ServiceUnavailable);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(LlmError::Api {
                status: 429,
                message: "slow down".into(),
            }),
            Err(LlmError::Unavailable("reset".into())),
            Ok("{\"value\": 7}".into()),
        ]));
        let settings = AnalyzerSettings {
            retry: RetryPolicy::exponential(3, Duration::from_secs(1)),
            ..AnalyzerSettings::default()
        };
        let analyzer = analyzer_with(generator.clone(), settings);

        let started = tokio::time::Instant::now();
        let result = analyzer.analyze(&EchoRequest("hi".into())).await;

        assert_eq!(result.record(), Some(&EchoRecord { value: 7.0 }));
        assert_eq!(generator.calls(), 3);
        // 1s + 2s of backoff
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skips_permanent_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(LlmError::Api {
                status: 401,
                message: "bad key".into(),
            }),
            Ok("{\"value\": 7}".into()),
        ]));
        let settings = AnalyzerSettings {
            retry: RetryPolicy::exponential(3, Duration::from_secs(1)),
            ..AnalyzerSettings::default()
        };
        let analyzer = analyzer_with(generator.clone(), settings);

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::ServiceUnavailable);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_reports_attempts() {
        let settings = AnalyzerSettings {
            retry: RetryPolicy::exponential(2, Duration::from_millis(100)),
            call_timeout: Duration::from_secs(1),
            ..AnalyzerSettings::default()
        };
        let analyzer = analyzer_with(Arc::new(HangingGenerator), settings);

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;
        let failure = result.failure().unwrap();

        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.reason.contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_invalid_reply_is_not_retried() {
        let generator = Arc::new(FnGenerator::new(|_| Ok("{\"value\": 1000}".to_string())));
        let settings = AnalyzerSettings {
            retry: RetryPolicy::exponential(3, Duration::from_millis(1)),
            ..AnalyzerSettings::default()
        };
        let analyzer = analyzer_with(generator.clone(), settings);

        let result = analyzer.analyze(&EchoRequest("hi".into())).await;

        assert_eq!(result.failure().unwrap().kind, FailureKind::InvalidStructure);
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn test_failure_reason_is_never_empty() {
        let failure = Failure::new(FailureKind::Timeout, "  ");
        assert_eq!(failure.reason, "timeout");
    }

    #[test]
    fn test_structured_result_serialization() {
        let ok: StructuredResult<EchoRecord> = StructuredResult::Ok {
            record: EchoRecord { value: 3.0 },
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "record": {"value": 3.0}}));

        let failed: StructuredResult<EchoRecord> =
            StructuredResult::failed(FailureKind::MalformedReply, "no braces");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "failed", "kind": "MALFORMED_REPLY", "reason": "no braces"})
        );
    }

    #[test]
    fn test_from_reply_is_pure() {
        let reply = "noise {\"value\": 12} noise";
        let a = StructuredResult::<EchoRecord>::from_reply(reply, ExtractionStrategy::Outermost);
        let b = StructuredResult::<EchoRecord>::from_reply(reply, ExtractionStrategy::Outermost);
        assert_eq!(a, b);
        assert!(a.is_ok());
    }
}
