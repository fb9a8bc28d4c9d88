//! Job description parser: pulls skills, minimum experience and education out of a JD.
//!
//! Pure keyword matching, no model call. The result is shared by every screening
//! request in a batch.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Skill patterns in category order: programming, databases, frameworks, tools.
static SKILL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(python|java|javascript|c\+\+|react|angular|node\.js)\b",
        r"\b(mysql|postgresql|mongodb|redis|oracle)\b",
        r"\b(django|flask|spring|express|laravel)\b",
        r"\b(git|docker|kubernetes|jenkins|aws|azure)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("skill pattern should compile"))
    .collect()
});

static EXPERIENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)[\s\-\+]*(?:years?|yrs?)").expect("experience pattern should compile")
});

pub(crate) static EDUCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(bachelor|master|phd|b\.tech|m\.tech|bca|mca)\b")
        .expect("education pattern should compile")
});

/// What a job description asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequirements {
    /// Deduplicated, in category then first-appearance order.
    pub skills: Vec<String>,
    /// Largest "N years" / "N yrs" figure in the text, 0 if none.
    pub experience_years: u32,
    /// Deduplicated and sorted.
    pub education: Vec<String>,
    /// Reserved; always empty.
    pub certifications: Vec<String>,
}

/// Extracts [`JobRequirements`] from raw job description text.
pub fn parse_job_description(text: &str) -> JobRequirements {
    let lower = text.to_lowercase();

    let mut skills: Vec<String> = Vec::new();
    for pattern in SKILL_PATTERNS.iter() {
        for found in pattern.find_iter(&lower) {
            let skill = found.as_str();
            if !skills.iter().any(|s| s == skill) {
                skills.push(skill.to_string());
            }
        }
    }

    JobRequirements {
        skills,
        experience_years: max_years(&EXPERIENCE_PATTERN, &lower).unwrap_or(0),
        education: find_degrees(&lower),
        certifications: Vec::new(),
    }
}

/// Largest captured integer among all matches of `pattern`.
pub(crate) fn max_years(pattern: &Regex, lower: &str) -> Option<u32> {
    pattern
        .captures_iter(lower)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
}

/// Degree keywords found in `lower`, deduplicated and sorted.
pub(crate) fn find_degrees(lower: &str) -> Vec<String> {
    let mut degrees: Vec<String> = EDUCATION_PATTERN
        .find_iter(lower)
        .map(|m| m.as_str().to_string())
        .collect();
    degrees.sort();
    degrees.dedup();
    degrees
}
