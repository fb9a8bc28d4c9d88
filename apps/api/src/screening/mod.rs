//! Resume screening: job description parsing, resume keyword profiles and
//! model-backed scoring of each resume against the parsed requirements.

use std::sync::Arc;

use crate::analysis::{AnalysisRequest, TaskKind};
use crate::llm_client::prompts::PromptOptions;

pub mod handlers;
pub mod job_parser;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod resume_parser;

use job_parser::JobRequirements;
use record::ScreeningRecord;

/// One resume to score. The requirements are shared across a batch.
#[derive(Debug, Clone)]
pub struct ScreeningRequest {
    pub resume_text: String,
    pub requirements: Arc<JobRequirements>,
}

impl ScreeningRequest {
    pub fn new(resume_text: impl Into<String>, requirements: Arc<JobRequirements>) -> Self {
        Self {
            resume_text: resume_text.into(),
            requirements,
        }
    }
}

impl AnalysisRequest for ScreeningRequest {
    type Record = ScreeningRecord;

    const KIND: TaskKind = TaskKind::ResumeScreening;

    fn subject(&self) -> &str {
        &self.resume_text
    }

    fn build_prompt(&self, options: &PromptOptions) -> String {
        prompts::build_screening_prompt(&self.resume_text, &self.requirements, options)
    }
}
