//! Fakes and infrastructure handles shared by unit tests.
//!
//! Tests marked `#[ignore]` need a disposable Postgres and Redis:
//!
//! ```bash
//! TEST_DATABASE_URL=postgres://localhost/evaluator_test \
//! TEST_REDIS_URL=redis://127.0.0.1:6379 \
//! cargo test -- --ignored --test-threads=1
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{create_pool, run_migrations};
use crate::llm_client::{Embedder, LanguageModel, LlmError, ResponseFormat};
use crate::queue::JobQueue;
use crate::vector_store::retrieval::ContextRetriever;

pub const CV_JSON: &str = r#"{
    "fullname": "Jane Doe",
    "category_job": "Backend Developer",
    "skills": ["Rust", "PostgreSQL", "Redis"],
    "experience_years": 4,
    "projects": [{"name": "queue", "technologies": ["redis"]}]
}"#;

pub const MATCH_JSON: &str = r#"{
    "match_rate": 0.82,
    "feedback": "Strong backend fit.",
    "skill_breakdown": {"technical_skills": 0.9, "experience_level": 0.8, "achievements": 0.7, "cultural_fit": 0.6},
    "missing_skills": ["Kubernetes"],
    "strong_points": ["Async Rust"]
}"#;

pub const PROJECT_JSON: &str = r#"{
    "parameter_scores": {"correctness": 8, "code_quality": 7.5, "resilience": 6, "documentation": 9, "creativity": 7},
    "weighted_score": 9.9,
    "feedback": "Solid chaining, thin retries.",
    "recommendations": ["Add backoff jitter"]
}"#;

pub fn ok(s: &str) -> Result<String, LlmError> {
    Ok(s.to_string())
}

/// Replays canned responses in order and records every prompt it sees.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(vec![]),
        })
    }

    /// Four responses that carry one evaluation through every step.
    pub fn successful() -> Arc<Self> {
        Self::new(vec![
            ok(CV_JSON),
            ok(MATCH_JSON),
            ok(PROJECT_JSON),
            ok("Good candidate overall."),
        ])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        prompt: &str,
        _system: &str,
        _format: ResponseFormat,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

pub struct FixedRetriever;

#[async_trait]
impl ContextRetriever for FixedRetriever {
    async fn job_context(&self, job_description: &str, category_job: &str) -> String {
        format!("CONTEXT[{category_job}|{job_description}]")
    }

    async fn scoring_rubric(&self) -> String {
        "RUBRIC-V1".to_string()
    }
}

/// Embeds text as its length, and fails every call after the first `budget`.
pub struct FlakyEmbedder {
    budget: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn failing_after(budget: usize) -> Arc<Self> {
        Arc::new(Self {
            budget,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn reliable() -> Arc<Self> {
        Self::failing_after(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.budget {
            return Err(LlmError::Api {
                status: 503,
                message: "embedding service unavailable".into(),
            });
        }
        Ok(vec![text.len() as f32, 1.0])
    }
}

/// Migrated pool on `TEST_DATABASE_URL`.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required");
    let pool = create_pool(&url, 5).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Queue on `TEST_REDIS_URL` under a key prefix no other test shares.
pub fn test_queue() -> JobQueue {
    let url = std::env::var("TEST_REDIS_URL").expect("TEST_REDIS_URL required");
    JobQueue::with_prefix(&url, &format!("evaluator-test:{}:", Uuid::new_v4())).unwrap()
}
