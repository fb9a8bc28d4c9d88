//! In-process stand-ins for the model, used by unit tests across the crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmError, TextGenerator};

/// Answers each prompt by calling a closure. Counts calls.
pub struct FnGenerator<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> FnGenerator<F>
where
    F: Fn(&str) -> Result<String, LlmError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str) -> Result<String, LlmError> + Send + Sync,
{
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }

    fn model(&self) -> &str {
        "fake"
    }
}

/// Replays a fixed script of replies in call order; errors once the script runs out.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Never answers within any sane deadline.
pub struct HangingGenerator;

#[async_trait]
impl TextGenerator for HangingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        Err(LlmError::EmptyContent)
    }

    fn model(&self) -> &str {
        "hanging"
    }
}
