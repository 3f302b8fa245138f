use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::vector_store::defaults::{
    DEFAULT_PROJECT_RUBRIC, GENERIC_JOB_REQUIREMENTS, JOB_CONTEXT_UNAVAILABLE,
};
use crate::vector_store::{
    ScoredDocument, VectorStore, VectorStoreError, JOB_COLLECTION, RUBRIC_COLLECTION,
};

/// Job descriptions longer than this are used verbatim instead of a lookup.
pub const CUSTOM_DESCRIPTION_MIN_CHARS: usize = 50;
const JOB_CONTEXT_RESULTS: usize = 2;

/// Supplies the job context and rubric that the evaluation prompts are grounded on.
/// Never fails: every lookup degrades to a fallback text.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn job_context(&self, job_description: &str, category_job: &str) -> String;
    async fn scoring_rubric(&self) -> String;
}

/// Query text used to find requirement documents for a CV's job category.
pub fn job_query(category_job: &str) -> String {
    format!("{category_job} developer requirements skills experience")
}

pub fn custom_job_context(job_description: &str) -> Option<String> {
    let trimmed = job_description.trim();
    (trimmed.chars().count() > CUSTOM_DESCRIPTION_MIN_CHARS)
        .then(|| format!("Custom Job Description:\n{job_description}"))
}

/// Turns a job-collection lookup into prompt context.
pub fn job_context_from(lookup: Result<Vec<ScoredDocument>, VectorStoreError>) -> String {
    match lookup {
        Ok(docs) if !docs.is_empty() => {
            info!("Retrieved {} job context documents", docs.len());
            docs.into_iter()
                .map(|d| d.content)
                .collect::<Vec<_>>()
                .join("\n")
        }
        Ok(_) => {
            warn!("Using generic job context as fallback");
            GENERIC_JOB_REQUIREMENTS.to_string()
        }
        Err(e) => {
            error!("Error retrieving job context: {e}");
            JOB_CONTEXT_UNAVAILABLE.to_string()
        }
    }
}

/// Turns a rubric-collection lookup into the rubric text.
pub fn rubric_from(lookup: Result<Vec<ScoredDocument>, VectorStoreError>) -> String {
    match lookup {
        Ok(docs) => match docs.into_iter().next() {
            Some(doc) => {
                info!("Retrieved project scoring rubric {}", doc.id);
                doc.content
            }
            None => {
                warn!("No scoring rubric found, using default");
                DEFAULT_PROJECT_RUBRIC.to_string()
            }
        },
        Err(e) => {
            error!("Error retrieving scoring rubric, using default: {e}");
            DEFAULT_PROJECT_RUBRIC.to_string()
        }
    }
}

#[async_trait]
impl ContextRetriever for VectorStore {
    async fn job_context(&self, job_description: &str, category_job: &str) -> String {
        if let Some(context) = custom_job_context(job_description) {
            info!("Using custom job description for context");
            return context;
        }
        info!("Retrieving job context for category: {category_job}");
        job_context_from(
            self.query(JOB_COLLECTION, &job_query(category_job), JOB_CONTEXT_RESULTS)
                .await,
        )
    }

    async fn scoring_rubric(&self) -> String {
        rubric_from(
            self.query(RUBRIC_COLLECTION, "project evaluation scoring rubric", 1)
                .await,
        )
    }
}
