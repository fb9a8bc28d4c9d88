//! Batch orchestration: many requests, one result per request, in input order.
//!
//! At most `concurrency` model calls are in flight at once. A failed item never
//! affects its neighbours.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AnalysisRequest, Analyzer, StructuredResult, TaskKind};

/// Lifecycle of one batch item: Pending → Requested → (Extracted | Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Requested,
    Extracted,
    Failed,
}

/// Receives item state transitions. `index` is 0-based; `total` is the batch size.
pub trait BatchObserver: Send + Sync {
    fn on_transition(&self, task: TaskKind, index: usize, total: usize, state: ItemState);
}

/// Default observer: progress lines through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_transition(&self, task: TaskKind, index: usize, total: usize, state: ItemState) {
        match state {
            ItemState::Pending => {}
            ItemState::Requested => {
                info!(task = task.as_str(), "Analyzing item {}/{}", index + 1, total)
            }
            ItemState::Extracted => {
                debug!(task = task.as_str(), "Item {}/{} extracted", index + 1, total)
            }
            ItemState::Failed => {
                warn!(task = task.as_str(), "Item {}/{} failed", index + 1, total)
            }
        }
    }
}

/// One result per input, positionally aligned with the inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResult<T> {
    items: Vec<StructuredResult<T>>,
}

impl<T> BatchResult<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StructuredResult<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructuredResult<T>> {
        self.items.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

impl<T> IntoIterator for BatchResult<T> {
    type Item = StructuredResult<T>;
    type IntoIter = std::vec::IntoIter<StructuredResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Applies one analysis to every request in a list.
#[derive(Clone)]
pub struct BatchOrchestrator {
    analyzer: Analyzer,
    concurrency: usize,
    observer: Arc<dyn BatchObserver>,
}

impl BatchOrchestrator {
    /// `concurrency` is clamped to at least 1 (strictly sequential).
    pub fn new(analyzer: Analyzer, concurrency: usize) -> Self {
        Self {
            analyzer,
            concurrency: concurrency.max(1),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Analyses every request. The output has the same length and order as `requests`,
    /// whatever order the calls complete in.
    pub async fn run<R: AnalysisRequest>(&self, requests: &[R]) -> BatchResult<R::Record> {
        let total = requests.len();
        for index in 0..total {
            self.observer
                .on_transition(R::KIND, index, total, ItemState::Pending);
        }

        let calls: Vec<BoxFuture<'_, StructuredResult<R::Record>>> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| self.run_item(index, total, request).boxed())
            .collect();
        let items = stream::iter(calls)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let batch = BatchResult { items };
        info!(
            task = R::KIND.as_str(),
            "Batch complete: {} succeeded, {} failed",
            batch.succeeded(),
            batch.failed()
        );
        batch
    }

    async fn run_item<R: AnalysisRequest>(
        &self,
        index: usize,
        total: usize,
        request: &R,
    ) -> StructuredResult<R::Record> {
        self.observer
            .on_transition(R::KIND, index, total, ItemState::Requested);
        let result = self.analyzer.analyze(request).await;
        let state = if result.is_ok() {
            ItemState::Extracted
        } else {
            ItemState::Failed
        };
        self.observer.on_transition(R::KIND, index, total, state);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::testing::{EchoRecord, EchoRequest};
    use crate::analysis::{AnalyzerSettings, FailureKind};
    use crate::llm_client::fake::{FnGenerator, HangingGenerator};
    use crate::llm_client::{LlmError, TextGenerator};

    fn orchestrator(generator: Arc<dyn TextGenerator>, concurrency: usize) -> BatchOrchestrator {
        BatchOrchestrator::new(
            Analyzer::new(generator, AnalyzerSettings::default()),
            concurrency,
        )
    }

    fn requests(subjects: &[&str]) -> Vec<EchoRequest> {
        subjects.iter().map(|s| EchoRequest(s.to_string())).collect()
    }

    /// Answers `echo:<n>` with `{"value": n}` after sleeping `n` ms, and tracks
    /// the peak number of concurrent calls.
    struct SlowEcho {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowEcho {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for SlowEcho {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let n: u64 = prompt.trim_start_matches("echo:").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(n)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("{{\"value\": {n}}}"))
        }

        fn model(&self) -> &str {
            "slow-echo"
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<(usize, ItemState)>>,
    }

    impl BatchObserver for RecordingObserver {
        fn on_transition(&self, _task: TaskKind, index: usize, _total: usize, state: ItemState) {
            self.events.lock().unwrap().push((index, state));
        }
    }

    #[tokio::test]
    async fn test_failed_item_does_not_affect_neighbours() {
        let generator = Arc::new(FnGenerator::new(|prompt| {
            if prompt.contains("second") {
                Err(LlmError::Unavailable("network unreachable".into()))
            } else {
                Ok("{\"value\": 5}".to_string())
            }
        }));
        let batch = orchestrator(generator, 1)
            .run(&requests(&["first", "second", "third"]))
            .await;

        assert_eq!(batch.len(), 3);
        assert!(batch.get(0).unwrap().is_ok());
        assert_eq!(
            batch.get(1).unwrap().failure().unwrap().kind,
            FailureKind::ServiceUnavailable
        );
        assert!(batch.get(2).unwrap().is_ok());
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let generator = Arc::new(FnGenerator::new(|_| Ok("{\"value\": 1}".to_string())));
        let batch = orchestrator(generator.clone(), 4)
            .run::<EchoRequest>(&[])
            .await;

        assert!(batch.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_when_completion_order_differs() {
        let batch = orchestrator(Arc::new(SlowEcho::new()), 3)
            .run(&requests(&["30", "10", "20"]))
            .await;

        let values: Vec<f64> = batch
            .iter()
            .map(|r| r.record().unwrap().value)
            .collect();
        assert_eq!(values, vec![30.0, 10.0, 20.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_is_respected() {
        let generator = Arc::new(SlowEcho::new());
        let subjects: Vec<String> = (1..=10).map(|n| (n * 5).to_string()).collect();
        let subjects: Vec<&str> = subjects.iter().map(String::as_str).collect();

        let batch = orchestrator(generator.clone(), 3)
            .run(&requests(&subjects))
            .await;

        assert_eq!(batch.succeeded(), 10);
        let peak = generator.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_by_default() {
        let generator = Arc::new(SlowEcho::new());
        orchestrator(generator.clone(), 0)
            .run(&requests(&["5", "5", "5"]))
            .await;
        assert_eq!(generator.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_item_requested_exactly_once() {
        let generator = Arc::new(FnGenerator::new(|prompt| {
            if prompt.ends_with('b') {
                Ok("garbage".to_string())
            } else {
                Ok("{\"value\": 1}".to_string())
            }
        }));
        let observer = Arc::new(RecordingObserver::default());
        let batch = orchestrator(generator.clone(), 2)
            .with_observer(observer.clone())
            .run(&requests(&["a", "b", ""]))
            .await;

        let events = observer.events.lock().unwrap().clone();
        for index in 0..3 {
            let requested = events
                .iter()
                .filter(|(i, s)| *i == index && *s == ItemState::Requested)
                .count();
            assert_eq!(requested, 1, "item {index}");
            assert_eq!(
                events.iter().filter(|(i, _)| *i == index).count(),
                3,
                "pending, requested and one terminal state for item {index}"
            );
        }
        assert!(events.contains(&(1, ItemState::Failed)));
        assert!(events.contains(&(2, ItemState::Failed)));
        // the blank item never reaches the model
        assert_eq!(generator.calls(), 2);
        assert_eq!(
            batch.get(2).unwrap().failure().unwrap().kind,
            FailureKind::EmptyInput
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_item_times_out_without_blocking_batch() {
        struct HangOnSecond(HangingGenerator);

        #[async_trait]
        impl TextGenerator for HangOnSecond {
            async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
                if prompt.ends_with("hang") {
                    self.0.generate(prompt).await
                } else {
                    Ok("{\"value\": 2}".to_string())
                }
            }

            fn model(&self) -> &str {
                "hang-on-second"
            }
        }

        let settings = AnalyzerSettings {
            call_timeout: Duration::from_secs(2),
            ..AnalyzerSettings::default()
        };
        let orchestrator = BatchOrchestrator::new(
            Analyzer::new(Arc::new(HangOnSecond(HangingGenerator)), settings),
            2,
        );
        let batch = orchestrator.run(&requests(&["ok", "hang", "ok"])).await;

        assert_eq!(
            batch.get(1).unwrap().failure().unwrap().kind,
            FailureKind::Timeout
        );
        assert_eq!(batch.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_prose_wrapped_reply_and_refusal() {
        let generator = Arc::new(FnGenerator::new(|prompt| {
            if prompt.ends_with("refuse") {
                Ok("I cannot process this.".to_string())
            } else {
                Ok("Sure! {\"value\": 82}".to_string())
            }
        }));
        let batch = orchestrator(generator, 1)
            .run(&requests(&["fine", "refuse"]))
            .await;

        assert_eq!(
            batch.get(0).unwrap().record(),
            Some(&EchoRecord { value: 82.0 })
        );
        assert_eq!(
            batch.get(1).unwrap().failure().unwrap().kind,
            FailureKind::MalformedReply
        );
    }

    #[test]
    fn test_batch_result_serializes_as_list() {
        let batch: BatchResult<EchoRecord> = BatchResult {
            items: vec![
                StructuredResult::Ok {
                    record: EchoRecord { value: 1.0 },
                },
                StructuredResult::failed(FailureKind::Timeout, "slow"),
            ],
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.is_array());
        assert_eq!(json[1]["kind"], "TIMEOUT");
    }
}
