// Prompt templates for resume screening.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{
    join_or_none, quote_subject, render_few_shot, FewShotExample, PromptOptions,
    JSON_ONLY_INSTRUCTION,
};

use super::job_parser::JobRequirements;

/// Screening prompt template.
/// Replace: {skills}, {experience_years}, {education}, {json_only}, then {resume_block} last.
pub const SCREENING_PROMPT_TEMPLATE: &str = r#"You are an expert HR recruiter. Analyze the following resume against the job requirements and provide a detailed evaluation.

JOB REQUIREMENTS:
- Required Skills: {skills}
- Experience Required: {experience_years} years
- Education: {education}

{resume_block}

Provide your analysis as a JSON object with this EXACT schema:
{
  "overall_score": <number from 0 to 100>,
  "skills_match": {
    "matched_skills": [<string>, ...],
    "missing_skills": [<critical required skills the candidate lacks>],
    "skills_score": <number from 0 to 100>
  },
  "experience_match": {
    "candidate_experience": <years, number >= 0>,
    "meets_requirement": <true or false>,
    "experience_score": <number from 0 to 100>
  },
  "education_match": {
    "candidate_education": [<string>, ...],
    "meets_requirement": <true or false>,
    "education_score": <number from 0 to 100>
  },
  "strengths": [<string>, ...],
  "concerns": [<string>, ...],
  "recommendation": <exactly one of "HIRE", "CONSIDER", "REJECT">
}

"overall_score" and "recommendation" are required. Be objective and thorough in your analysis.
{json_only}"#;

pub const SCREENING_EXAMPLES: &[FewShotExample] = &[
    FewShotExample {
        input: "Software Engineer with Python, 2 years experience",
        output: r#"{"overall_score": 75, "recommendation": "CONSIDER"}"#,
    },
    FewShotExample {
        input: "Senior Developer, Java, Spring, 5 years",
        output: r#"{"overall_score": 90, "recommendation": "HIRE"}"#,
    },
];

pub fn build_screening_prompt(
    resume_text: &str,
    requirements: &JobRequirements,
    options: &PromptOptions,
) -> String {
    let mut prompt = SCREENING_PROMPT_TEMPLATE
        .replace("{skills}", &join_or_none(&requirements.skills))
        .replace(
            "{experience_years}",
            &requirements.experience_years.to_string(),
        )
        .replace("{education}", &join_or_none(&requirements.education))
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{resume_block}", &quote_subject("RESUME", resume_text));

    if options.few_shot {
        prompt.push_str(&render_few_shot(SCREENING_EXAMPLES));
    }
    prompt
}
