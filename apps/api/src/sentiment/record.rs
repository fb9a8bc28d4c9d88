//! Typed results of sentiment analysis and attrition prediction.

use serde::{Deserialize, Serialize};

use crate::llm_client::extract::{check_range, StructuredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Neutral => "NEUTRAL",
            Self::Negative => "NEGATIVE",
        }
    }
}

/// LOW / MEDIUM / HIGH, used for risk and engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttritionRisk {
    pub risk_level: Level,
    pub risk_score: f64,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementLevel {
    pub level: Level,
    pub score: f64,
    #[serde(default)]
    pub positive_indicators: Vec<String>,
    #[serde(default)]
    pub negative_indicators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    /// -1 very negative, 0 neutral, 1 very positive.
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub emotional_indicators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrition_risk: Option<AttritionRisk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_level: Option<EngagementLevel>,
    #[serde(default)]
    pub actionable_insights: Vec<String>,
}

impl StructuredRecord for SentimentRecord {
    fn validate(&self) -> Result<(), String> {
        check_range("sentiment_score", self.sentiment_score, -1.0, 1.0)?;
        if let Some(confidence) = self.confidence {
            check_range("confidence", confidence, 0.0, 1.0)?;
        }
        if let Some(risk) = &self.attrition_risk {
            check_range("attrition_risk.risk_score", risk.risk_score, 0.0, 1.0)?;
        }
        if let Some(engagement) = &self.engagement_level {
            check_range("engagement_level.score", engagement.score, 0.0, 1.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttritionRecord {
    pub attrition_probability: f64,
    pub risk_category: Level,
    #[serde(default)]
    pub key_risk_factors: Vec<String>,
    #[serde(default)]
    pub protective_factors: Vec<String>,
    #[serde(default)]
    pub recommended_interventions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_level: Option<PriorityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl StructuredRecord for AttritionRecord {
    fn validate(&self) -> Result<(), String> {
        check_range("attrition_probability", self.attrition_probability, 0.0, 1.0)?;
        if let Some(confidence) = self.confidence {
            check_range("confidence", confidence, 0.0, 1.0)?;
        }
        Ok(())
    }
}
