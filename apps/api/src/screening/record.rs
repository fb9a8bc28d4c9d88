//! Typed result of one resume screening.

use serde::{Deserialize, Serialize};

use crate::llm_client::extract::{check_range, StructuredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Hire,
    Consider,
    Reject,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hire => "HIRE",
            Self::Consider => "CONSIDER",
            Self::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsMatch {
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    pub skills_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceMatch {
    /// Years.
    pub candidate_experience: f64,
    pub meets_requirement: bool,
    pub experience_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationMatch {
    #[serde(default)]
    pub candidate_education: Vec<String>,
    pub meets_requirement: bool,
    pub education_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub overall_score: f64,
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_match: Option<SkillsMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_match: Option<ExperienceMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_match: Option<EducationMatch>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl StructuredRecord for ScreeningRecord {
    fn validate(&self) -> Result<(), String> {
        check_range("overall_score", self.overall_score, 0.0, 100.0)?;
        if let Some(skills) = &self.skills_match {
            check_range("skills_match.skills_score", skills.skills_score, 0.0, 100.0)?;
        }
        if let Some(experience) = &self.experience_match {
            check_range(
                "experience_match.candidate_experience",
                experience.candidate_experience,
                0.0,
                f64::MAX,
            )?;
            check_range(
                "experience_match.experience_score",
                experience.experience_score,
                0.0,
                100.0,
            )?;
        }
        if let Some(education) = &self.education_match {
            check_range(
                "education_match.education_score",
                education.education_score,
                0.0,
                100.0,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::extract::{extract_record, ExtractError, ExtractionStrategy};

    fn extract(reply: &str) -> Result<ScreeningRecord, ExtractError> {
        extract_record(reply, ExtractionStrategy::Outermost)
    }

    #[test]
    fn test_minimal_record_defaults_optional_fields() {
        let record = extract("Sure! {\"overall_score\": 82, \"recommendation\": \"HIRE\"}").unwrap();
        assert_eq!(record.overall_score, 82.0);
        assert_eq!(record.recommendation, Recommendation::Hire);
        assert!(record.skills_match.is_none());
        assert!(record.strengths.is_empty());
        assert!(record.concerns.is_empty());
    }

    #[test]
    fn test_full_record_parses() {
        let reply = r#"{
            "overall_score": 71.5,
            "skills_match": {"matched_skills": ["python"], "missing_skills": ["docker"], "skills_score": 60},
            "experience_match": {"candidate_experience": 3, "meets_requirement": true, "experience_score": 80},
            "education_match": {"candidate_education": ["bachelor"], "meets_requirement": true, "education_score": 90},
            "strengths": ["clear writing"],
            "concerns": ["short tenures"],
            "recommendation": "CONSIDER"
        }"#;
        let record = extract(reply).unwrap();
        assert_eq!(record.recommendation, Recommendation::Consider);
        assert_eq!(record.skills_match.unwrap().missing_skills, vec!["docker"]);
        assert_eq!(record.experience_match.unwrap().candidate_experience, 3.0);
        assert_eq!(record.concerns, vec!["short tenures"]);
    }

    #[test]
    fn test_score_out_of_range_is_invalid() {
        let err = extract("{\"overall_score\": 140, \"recommendation\": \"HIRE\"}").unwrap_err();
        assert!(matches!(err, ExtractError::Invalid(msg) if msg.contains("overall_score")));
    }

    #[test]
    fn test_nested_score_out_of_range_is_invalid() {
        let reply = r#"{"overall_score": 50, "recommendation": "REJECT",
            "skills_match": {"skills_score": -5}}"#;
        assert!(matches!(extract(reply), Err(ExtractError::Invalid(_))));
    }

    #[test]
    fn test_unknown_recommendation_is_invalid() {
        let err = extract("{\"overall_score\": 50, \"recommendation\": \"MAYBE\"}").unwrap_err();
        assert!(matches!(err, ExtractError::Invalid(_)));
    }

    #[test]
    fn test_missing_recommendation_is_invalid() {
        assert!(matches!(
            extract("{\"overall_score\": 50}"),
            Err(ExtractError::Invalid(_))
        ));
    }
}
