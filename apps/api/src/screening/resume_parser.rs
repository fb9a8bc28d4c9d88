//! Keyword profile of a resume: contact details, known skills, years of experience, degrees.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::job_parser::{find_degrees, max_years};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern should compile")
});

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?[1-9]?[0-9]{7,14}").expect("phone pattern should compile"));

/// "5 years of experience" first, then "experience of 5 years".
/// The first pattern with any match decides.
static EXPERIENCE_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d+)[\s\-\+]*(?:years?|yrs?)[\s\-\+]*(?:of\s+)?(?:experience|exp)")
            .expect("experience pattern should compile"),
        Regex::new(r"(?:experience|exp)[\s\-\+]*(?:of\s+)?(\d+)[\s\-\+]*(?:years?|yrs?)")
            .expect("experience pattern should compile"),
    ]
});

const SKILL_KEYWORDS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "react",
    "angular",
    "node.js",
    "django",
    "flask",
    "spring",
    "mysql",
    "postgresql",
    "mongodb",
    "git",
    "docker",
    "kubernetes",
    "aws",
    "azure",
    "jenkins",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Keyword-list order. Substring match, so "javascript" also yields "java".
    pub skills: Vec<String>,
    pub experience_years: u32,
    pub education: Vec<String>,
}

pub fn parse_resume_profile(text: &str) -> ResumeProfile {
    let lower = text.to_lowercase();

    let skills = SKILL_KEYWORDS
        .iter()
        .filter(|skill| lower.contains(*skill))
        .map(|skill| skill.to_string())
        .collect();

    let experience_years = EXPERIENCE_PATTERNS
        .iter()
        .find_map(|pattern| max_years(pattern, &lower))
        .unwrap_or(0);

    ResumeProfile {
        email: EMAIL_PATTERN.find(text).map(|m| m.as_str().to_string()),
        phone: PHONE_PATTERN.find(text).map(|m| m.as_str().to_string()),
        skills,
        experience_years,
        education: find_degrees(&lower),
    }
}
