// Prompt templates for sentiment analysis and attrition prediction.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{
    join_or_none, quote_subject, render_few_shot, FewShotExample, PromptOptions,
    JSON_ONLY_INSTRUCTION,
};

use super::EmployeeSnapshot;

/// Replace: {json_only}, then {feedback_block} last.
pub const SENTIMENT_PROMPT_TEMPLATE: &str = r#"You are an expert HR analyst specializing in employee sentiment analysis.
Analyze the following employee feedback and provide a comprehensive assessment.

{feedback_block}

Provide your analysis as a JSON object with this EXACT schema:
{
  "sentiment_score": <number from -1 to 1, where -1 is very negative, 0 is neutral, 1 is very positive>,
  "sentiment_label": <exactly one of "POSITIVE", "NEUTRAL", "NEGATIVE">,
  "confidence": <number from 0 to 1>,
  "key_themes": [<main themes or topics mentioned>],
  "emotional_indicators": [<emotional words or phrases found>],
  "attrition_risk": {
    "risk_level": <exactly one of "LOW", "MEDIUM", "HIGH">,
    "risk_score": <number from 0 to 1>,
    "risk_factors": [<factors indicating potential attrition>]
  },
  "engagement_level": {
    "level": <exactly one of "HIGH", "MEDIUM", "LOW">,
    "score": <number from 0 to 1>,
    "positive_indicators": [<positive engagement signals>],
    "negative_indicators": [<negative engagement signals>]
  },
  "actionable_insights": [<specific recommendations for management>]
}

"sentiment_score" and "sentiment_label" are required.
Focus on identifying subtle indicators of job satisfaction, engagement, and potential attrition risks.
{json_only}"#;

/// Replace: {json_only}, then {employee_block} last.
pub const ATTRITION_PROMPT_TEMPLATE: &str = r#"You are an expert HR data scientist. Based on the employee data provided,
predict the likelihood of this employee leaving the company.

{employee_block}

Provide your prediction as a JSON object with this EXACT schema:
{
  "attrition_probability": <number from 0 to 1>,
  "risk_category": <exactly one of "LOW", "MEDIUM", "HIGH">,
  "key_risk_factors": [<main factors contributing to risk>],
  "protective_factors": [<factors reducing risk>],
  "recommended_interventions": [<specific actions to reduce attrition risk>],
  "priority_level": <exactly one of "LOW", "MEDIUM", "HIGH", "URGENT">,
  "confidence": <number from 0 to 1>
}

"attrition_probability" and "risk_category" are required.
{json_only}"#;

pub const SENTIMENT_EXAMPLES: &[FewShotExample] = &[
    FewShotExample {
        input: "I love working here, great team!",
        output: r#"{"sentiment_score": 0.8, "sentiment_label": "POSITIVE", "attrition_risk": {"risk_level": "LOW", "risk_score": 0.1, "risk_factors": []}}"#,
    },
    FewShotExample {
        input: "Considering other opportunities",
        output: r#"{"sentiment_score": -0.3, "sentiment_label": "NEGATIVE", "attrition_risk": {"risk_level": "HIGH", "risk_score": 0.8, "risk_factors": ["actively looking elsewhere"]}}"#,
    },
];

pub fn build_sentiment_prompt(feedback: &str, options: &PromptOptions) -> String {
    let mut prompt = SENTIMENT_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{feedback_block}", &quote_subject("EMPLOYEE FEEDBACK", feedback));

    if options.few_shot {
        prompt.push_str(&render_few_shot(SENTIMENT_EXAMPLES));
    }
    prompt
}

/// The employee data block the attrition prompt quotes.
pub fn render_employee_data(snapshot: &EmployeeSnapshot) -> String {
    let unknown = || "Unknown".to_string();
    format!(
        "EMPLOYEE DATA:\n\
         - Employee ID: {id}\n\
         - Recent Feedback Sentiment: {sentiment:.2}\n\
         - Average Attrition Risk Score: {risk}\n\
         - Engagement Level: {engagement}\n\
         - Tenure: {tenure}\n\
         - Recent Feedback Count: {count}\n\
         - Department: {department}\n\
         - Role Level: {role_level}\n\
         \n\
         RECENT FEEDBACK THEMES: {themes}",
        id = snapshot.employee_id,
        sentiment = snapshot.avg_sentiment,
        risk = snapshot
            .avg_risk_score
            .map(|r| format!("{r:.2}"))
            .unwrap_or_else(unknown),
        engagement = snapshot
            .engagement_level
            .map(|l| l.as_str().to_string())
            .unwrap_or_else(unknown),
        tenure = snapshot
            .tenure_months
            .map(|m| format!("{m} months"))
            .unwrap_or_else(unknown),
        count = snapshot.feedback_count,
        department = snapshot.department.clone().unwrap_or_else(unknown),
        role_level = snapshot.role_level.clone().unwrap_or_else(unknown),
        themes = join_or_none(&snapshot.recent_themes),
    )
}

pub fn build_attrition_prompt(employee_data: &str, _options: &PromptOptions) -> String {
    ATTRITION_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{employee_block}", &quote_subject("EMPLOYEE DATA", employee_data))
}
