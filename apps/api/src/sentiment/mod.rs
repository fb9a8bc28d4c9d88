//! Employee sentiment analysis and attrition prediction.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisRequest, TaskKind};
use crate::llm_client::prompts::PromptOptions;

pub mod handlers;
pub mod pipeline;
pub mod preprocess;
pub mod prompts;
pub mod record;

use record::{AttritionRecord, Level, SentimentRecord};

/// One piece of employee feedback.
#[derive(Debug, Clone)]
pub struct SentimentRequest {
    pub feedback: String,
}

impl SentimentRequest {
    pub fn new(feedback: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
        }
    }
}

impl AnalysisRequest for SentimentRequest {
    type Record = SentimentRecord;

    const KIND: TaskKind = TaskKind::SentimentAnalysis;

    fn subject(&self) -> &str {
        &self.feedback
    }

    fn build_prompt(&self, options: &PromptOptions) -> String {
        prompts::build_sentiment_prompt(&self.feedback, options)
    }
}

/// Aggregated view of one employee's feedback, the input to attrition prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub employee_id: String,
    /// Mean sentiment score over the employee's analysed feedback.
    pub avg_sentiment: f64,
    #[serde(default)]
    pub avg_risk_score: Option<f64>,
    /// Most frequent engagement level.
    #[serde(default)]
    pub engagement_level: Option<Level>,
    pub feedback_count: usize,
    #[serde(default)]
    pub recent_themes: Vec<String>,
    #[serde(default)]
    pub tenure_months: Option<u32>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role_level: Option<String>,
}

/// Attrition prediction for one employee. The subject is the rendered employee data.
#[derive(Debug, Clone)]
pub struct AttritionRequest {
    pub snapshot: EmployeeSnapshot,
    employee_data: String,
}

impl AttritionRequest {
    pub fn new(snapshot: EmployeeSnapshot) -> Self {
        let employee_data = prompts::render_employee_data(&snapshot);
        Self {
            snapshot,
            employee_data,
        }
    }
}

impl AnalysisRequest for AttritionRequest {
    type Record = AttritionRecord;

    const KIND: TaskKind = TaskKind::AttritionPrediction;

    fn subject(&self) -> &str {
        &self.employee_data
    }

    fn build_prompt(&self, options: &PromptOptions) -> String {
        prompts::build_attrition_prompt(&self.employee_data, options)
    }
}
