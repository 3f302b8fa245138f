// Prompt templates for the evaluation chain.
// Placeholders in `{braces}` are filled in by `render` before sending.

/// Step 1. Replace: {cv_content}
pub const CV_EXTRACTION_PROMPT: &str = r#"Analyze this CV and extract structured information in JSON format.
Be thorough and accurate in extracting all available information.

CV Content:
{cv_content}

Extract the following information and return as valid JSON:
{
    "fullname": "candidate full name",
    "email": "candidate email address",
    "phone": "phone number with country code if available",
    "address": "full address or city/country",
    "category_job": "primary job category/role (e.g., Backend Developer, AI Engineer, Full Stack Developer)",
    "summary": "professional summary or objective (2-3 sentences max)",
    "skills": ["list", "of", "technical", "skills"],
    "strengths": ["key", "professional", "strengths", "and", "achievements"],
    "experience_years": estimated_total_years_of_experience_as_integer,
    "education": [
        {"degree": "degree name", "institution": "university/school name", "year": "graduation year or period"}
    ],
    "certifications": ["list", "of", "certifications"],
    "projects": [
        {"name": "project name", "description": "brief description", "technologies": ["tech1", "tech2"]}
    ]
}

Guidelines:
- If information is not available, use null or empty array []
- Skills should be specific technical skills, not soft skills
- Strengths should focus on professional achievements and capabilities
- Experience years should be your best estimate based on career progression
- Only return valid JSON, no additional text"#;

/// Steps 2 & 3. Replace: {job_context}, {category_job}, {experience_years},
/// {skills}, {summary}, {strengths}, {project_count}, {education_count}
pub const CV_MATCH_PROMPT: &str = r#"You are an expert HR evaluator. Compare this candidate profile with job requirements.

Job Requirements:
{job_context}

Candidate Profile:
- Position: {category_job}
- Experience: {experience_years} years
- Skills: {skills}
- Summary: {summary}
- Strengths: {strengths}
- Projects: {project_count} relevant projects
- Education: {education_count} qualifications

Evaluate match rate (0.0-1.0) based on these weighted criteria:
1. Technical Skills Match (40%) - How well do candidate's skills align with requirements?
2. Experience Level (30%) - Does experience level meet job requirements?
3. Relevant Achievements (20%) - Quality of projects and accomplishments
4. Cultural Fit (10%) - Communication, learning attitude indicators

Return JSON format:
{
    "match_rate": 0.75,
    "feedback": "Detailed feedback highlighting strengths and gaps (3-4 sentences)",
    "skill_breakdown": {
        "technical_skills": 0.8,
        "experience_level": 0.7,
        "achievements": 0.9,
        "cultural_fit": 0.6
    },
    "missing_skills": ["skill1", "skill2"],
    "strong_points": ["strength1", "strength2"]
}

Be honest and specific in your evaluation."#;

/// Step 4. Replace: {scoring_rubric}, {project_content}
pub const PROJECT_EVALUATION_PROMPT: &str = r#"Evaluate this project report against the scoring rubric.

Scoring Rubric:
{scoring_rubric}

Project Report:
{project_content}

Score each parameter (1-10) and provide specific feedback:

1. Correctness (25%) - Does it meet all requirements? (prompt design, LLM chaining, RAG, error handling)
2. Code Quality (25%) - Is code clean, modular, well-structured, testable?
3. Resilience (25%) - How well does it handle failures, implement retries, manage errors?
4. Documentation (15%) - Quality of README, code comments, architecture explanation
5. Creativity (10%) - Bonus features like authentication, deployment, monitoring, UI improvements

Return JSON:
{
    "parameter_scores": {
        "correctness": 8.0,
        "code_quality": 7.5,
        "resilience": 6.0,
        "documentation": 9.0,
        "creativity": 7.0
    },
    "weighted_score": 7.4,
    "feedback": "Detailed feedback on each parameter (4-5 sentences)",
    "recommendations": ["specific improvement suggestion 1", "suggestion 2"]
}"#;

/// Summary. Replace: {match_rate}, {cv_feedback}, {project_score}, {project_feedback}
pub const SUMMARY_PROMPT: &str = r#"Create a concise overall summary of this candidate based on CV and project evaluations.

CV Evaluation:
- Match Rate: {match_rate}
- Feedback: {cv_feedback}

Project Evaluation:
- Score: {project_score}/10
- Feedback: {project_feedback}

Write a 2-3 sentence executive summary that:
1. States overall candidate fit
2. Highlights key strengths
3. Mentions main development areas

Be professional, balanced, and actionable."#;

/// Fills `{name}` placeholders in one pass. Substituted text is never scanned
/// again, and braces that name no known placeholder are copied as-is.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(*name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_known_placeholders() {
        let out = render("{a} and {b}, {a} again", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y, x again");
    }

    #[test]
    fn test_render_keeps_json_braces() {
        let out = render(SUMMARY_PROMPT, &[("match_rate", "0.80")]);
        assert!(out.contains("Match Rate: 0.80"));
        assert!(out.contains("{cv_feedback}"));

        let out = render(CV_EXTRACTION_PROMPT, &[("cv_content", "Jane")]);
        assert!(out.contains("\"fullname\": \"candidate full name\""));
        assert!(out.contains("{\"degree\": \"degree name\""));
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render(
            "Summary: {summary}\nProjects: {project_count}",
            &[("summary", "I led {project_count} teams {"), ("project_count", "3")],
        );
        assert_eq!(out, "Summary: I led {project_count} teams {\nProjects: 3");
    }
}
