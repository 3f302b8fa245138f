//! Evaluation chain: CV extraction → job context → CV match → project
//! evaluation → summary.
//!
//! Model calls go through `LanguageModel` and context lookups through
//! `ContextRetriever`, so the whole chain runs against fakes in tests.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::evaluation::models::{CvExtraction, CvMatch, EvaluationResult, ProjectEvaluation};
use crate::evaluation::prompts::{
    render, CV_EXTRACTION_PROMPT, CV_MATCH_PROMPT, PROJECT_EVALUATION_PROMPT, SUMMARY_PROMPT,
};
use crate::evaluation::scoring::{
    detailed_scores, normalize_cv_match, normalize_project, project_score,
};
use crate::llm_client::prompts::{EVALUATOR_JSON_SYSTEM, EVALUATOR_TEXT_SYSTEM};
use crate::llm_client::{complete_json, LanguageModel, LlmError, ResponseFormat};
use crate::vector_store::retrieval::ContextRetriever;

/// Attempts per JSON step before malformed output fails the step.
const MALFORMED_OUTPUT_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct PipelineError {
    pub step: &'static str,
    #[source]
    pub source: LlmError,
}

impl PipelineError {
    fn at(step: &'static str) -> impl FnOnce(LlmError) -> Self {
        move |source| Self { step, source }
    }
}

/// Texts an evaluation runs on, loaded from the evaluation row.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub cv_content: String,
    pub project_content: String,
    pub job_description: String,
}

#[derive(Clone)]
pub struct EvaluationPipeline {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<dyn ContextRetriever>,
}

impl EvaluationPipeline {
    pub fn new(llm: Arc<dyn LanguageModel>, retriever: Arc<dyn ContextRetriever>) -> Self {
        Self { llm, retriever }
    }

    pub async fn run(
        &self,
        evaluation_id: Uuid,
        input: &EvaluationInput,
    ) -> Result<EvaluationResult, PipelineError> {
        info!("[{evaluation_id}] Step 1: Extracting CV information");
        let cv = self.extract_cv(evaluation_id, &input.cv_content).await?;
        info!(
            "[{evaluation_id}] CV extracted: category={}, skills={}",
            cv.category_job,
            cv.skills.len()
        );

        info!("[{evaluation_id}] Step 2: Retrieving job context");
        let job_context = self
            .retriever
            .job_context(&input.job_description, &cv.category_job)
            .await;

        info!("[{evaluation_id}] Step 3: Evaluating CV match");
        let cv_match: CvMatch = self
            .json_step(evaluation_id, "cv match", &cv_match_prompt(&job_context, &cv))
            .await
            .map_err(PipelineError::at("cv match"))?;
        let cv_match = normalize_cv_match(cv_match);
        let match_rate = cv_match.match_rate.unwrap_or(0.0);
        info!("[{evaluation_id}] CV match rate: {match_rate:.2}");

        info!("[{evaluation_id}] Step 4: Evaluating project");
        let rubric = self.retriever.scoring_rubric().await;
        let prompt = render(
            PROJECT_EVALUATION_PROMPT,
            &[
                ("scoring_rubric", &rubric),
                ("project_content", &input.project_content),
            ],
        );
        let project: ProjectEvaluation = self
            .json_step(evaluation_id, "project evaluation", &prompt)
            .await
            .map_err(PipelineError::at("project evaluation"))?;
        let project = normalize_project(project);
        let score = project_score(&project);
        if let Some(reported) = project.weighted_score {
            if (reported - score).abs() >= 0.05 {
                warn!("[{evaluation_id}] Model reported project score {reported}, using {score}");
            }
        }
        info!("[{evaluation_id}] Project score: {score}");

        info!("[{evaluation_id}] Step 5: Generating overall summary");
        let prompt = render(
            SUMMARY_PROMPT,
            &[
                ("match_rate", &format!("{match_rate:.2}")),
                ("cv_feedback", &cv_match.feedback),
                ("project_score", &score.to_string()),
                ("project_feedback", &project.feedback),
            ],
        );
        let summary = self
            .llm
            .complete(&prompt, EVALUATOR_TEXT_SYSTEM, ResponseFormat::Text)
            .await
            .map_err(PipelineError::at("summary"))?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(PipelineError {
                step: "summary",
                source: LlmError::EmptyContent,
            });
        }

        info!("[{evaluation_id}] Evaluation chain finished");

        Ok(EvaluationResult {
            cv_match_rate: match_rate,
            cv_feedback: cv_match.feedback.clone(),
            project_score: score,
            project_feedback: project.feedback.clone(),
            overall_summary: summary.to_string(),
            detailed_scores: detailed_scores(&cv_match, &project),
            missing_skills: cv_match.missing_skills,
            strong_points: cv_match.strong_points,
            recommendations: project.recommendations,
            cv_extraction: cv,
        })
    }

    /// Step 1. Unparseable output degrades to `CvExtraction::fallback()`;
    /// transport and API errors still fail the attempt.
    async fn extract_cv(
        &self,
        evaluation_id: Uuid,
        cv_content: &str,
    ) -> Result<CvExtraction, PipelineError> {
        let prompt = render(CV_EXTRACTION_PROMPT, &[("cv_content", cv_content)]);
        match self.json_step(evaluation_id, "cv extraction", &prompt).await {
            Ok(cv) => Ok(cv),
            Err(e @ (LlmError::Parse(_) | LlmError::EmptyContent)) => {
                warn!("[{evaluation_id}] CV extraction unparseable, using fallback: {e}");
                Ok(CvExtraction::fallback())
            }
            Err(e) => Err(PipelineError::at("cv extraction")(e)),
        }
    }

    /// JSON-mode call, repeated when the output is malformed.
    async fn json_step<T: DeserializeOwned>(
        &self,
        evaluation_id: Uuid,
        step: &str,
        prompt: &str,
    ) -> Result<T, LlmError> {
        let mut attempt = 1;
        loop {
            match complete_json::<T>(self.llm.as_ref(), prompt, EVALUATOR_JSON_SYSTEM).await {
                Err(e @ (LlmError::Parse(_) | LlmError::EmptyContent))
                    if attempt < MALFORMED_OUTPUT_ATTEMPTS =>
                {
                    warn!("[{evaluation_id}] Malformed {step} output (attempt {attempt}): {e}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn cv_match_prompt(job_context: &str, cv: &CvExtraction) -> String {
    let experience = cv
        .experience_years
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    render(
        CV_MATCH_PROMPT,
        &[
            ("job_context", job_context),
            ("category_job", &cv.category_job),
            ("experience_years", &experience),
            ("skills", &cv.skills.join(", ")),
            ("summary", &cv.summary),
            ("strengths", &cv.strengths.join(", ")),
            ("project_count", &cv.projects.len().to_string()),
            ("education_count", &cv.education.len().to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok, FixedRetriever, ScriptedModel, CV_JSON, MATCH_JSON, PROJECT_JSON};

    fn input() -> EvaluationInput {
        EvaluationInput {
            cv_content: "Jane Doe, backend engineer with Rust and Postgres.".into(),
            project_content: "Built an async evaluation service with retries.".into(),
            job_description: "Backend role".into(),
        }
    }

    fn pipeline(model: Arc<ScriptedModel>) -> EvaluationPipeline {
        EvaluationPipeline::new(model, Arc::new(FixedRetriever))
    }

    #[tokio::test]
    async fn test_full_chain_produces_result() {
        let model = ScriptedModel::new(vec![
            ok(CV_JSON),
            ok(MATCH_JSON),
            ok(PROJECT_JSON),
            ok("  Good candidate overall.  "),
        ]);
        let result = pipeline(model.clone())
            .run(Uuid::new_v4(), &input())
            .await
            .unwrap();

        assert_eq!(result.cv_match_rate, 0.82);
        assert_eq!(result.project_score, 7.4);
        assert_eq!(result.overall_summary, "Good candidate overall.");
        assert_eq!(result.cv_extraction.fullname, "Jane Doe");
        assert_eq!(result.detailed_scores.len(), 9);
        assert_eq!(result.missing_skills, vec!["Kubernetes"]);
        assert_eq!(result.recommendations, vec!["Add backoff jitter"]);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[1].contains("CONTEXT[Backend Developer|Backend role]"));
        assert!(prompts[1].contains("Rust, PostgreSQL, Redis"));
        assert!(prompts[1].contains("Experience: 4 years"));
        assert!(prompts[2].contains("RUBRIC-V1"));
        assert!(prompts[3].contains("Score: 7.4/10"));
        assert!(prompts[3].contains("Match Rate: 0.82"));
    }

    #[tokio::test]
    async fn test_unparseable_cv_falls_back() {
        let model = ScriptedModel::new(vec![
            ok("not json"),
            ok("still not json"),
            ok(MATCH_JSON),
            ok(PROJECT_JSON),
            ok("Summary."),
        ]);
        let result = pipeline(model.clone())
            .run(Uuid::new_v4(), &input())
            .await
            .unwrap();
        assert_eq!(result.cv_extraction, CvExtraction::fallback());
        assert!(model.prompts()[2].contains("CONTEXT[Unknown|Backend role]"));
    }

    #[tokio::test]
    async fn test_malformed_match_retried_once() {
        let model = ScriptedModel::new(vec![
            ok(CV_JSON),
            ok("{ truncated"),
            ok(MATCH_JSON),
            ok(PROJECT_JSON),
            ok("Summary."),
        ]);
        let result = pipeline(model).run(Uuid::new_v4(), &input()).await.unwrap();
        assert_eq!(result.cv_match_rate, 0.82);
    }

    #[tokio::test]
    async fn test_second_malformed_project_fails_attempt() {
        let model = ScriptedModel::new(vec![
            ok(CV_JSON),
            ok(MATCH_JSON),
            ok("nope"),
            ok("nope again"),
        ]);
        let err = pipeline(model).run(Uuid::new_v4(), &input()).await.unwrap_err();
        assert_eq!(err.step, "project evaluation");
        assert!(matches!(err.source, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_api_error_in_extraction_propagates() {
        let model = ScriptedModel::new(vec![Err(LlmError::Api {
            status: 401,
            message: "invalid api key".into(),
        })]);
        let err = pipeline(model).run(Uuid::new_v4(), &input()).await.unwrap_err();
        assert_eq!(err.step, "cv extraction");
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_blank_summary_is_an_error() {
        let model = ScriptedModel::new(vec![
            ok(CV_JSON),
            ok(MATCH_JSON),
            ok(PROJECT_JSON),
            ok("   "),
        ]);
        let err = pipeline(model).run(Uuid::new_v4(), &input()).await.unwrap_err();
        assert_eq!(err.step, "summary");
        assert!(matches!(err.source, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let model = ScriptedModel::new(vec![
            ok(CV_JSON),
            ok(r#"{"match_rate": 1.4, "feedback": "ok"}"#),
            ok(r#"{"parameter_scores": {"correctness": 15, "code_quality": 15, "resilience": 15, "documentation": 15, "creativity": 15}}"#),
            ok("Summary."),
        ]);
        let result = pipeline(model).run(Uuid::new_v4(), &input()).await.unwrap();
        assert_eq!(result.cv_match_rate, 1.0);
        assert_eq!(result.project_score, 10.0);
    }

    #[test]
    fn test_cv_text_cannot_inject_placeholders() {
        let mut cv = CvExtraction::fallback();
        cv.summary = "Led {project_count} teams, {education_count} degrees".into();
        cv.strengths = vec!["{job_context}".into()];

        let prompt = cv_match_prompt("JOB", &cv);
        assert!(prompt.contains("Summary: Led {project_count} teams, {education_count} degrees"));
        assert!(prompt.contains("Strengths: {job_context}"));
        assert!(prompt.contains("Projects: 0 relevant projects"));
        assert_eq!(prompt.matches("JOB").count(), 1);
    }
}
