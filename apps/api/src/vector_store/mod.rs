//! Vector store: Postgres-backed similarity lookup used for RAG.
//!
//! Documents live in `vector_documents` grouped by collection, each with an
//! embedding from the configured `Embedder`. Collections are small (a handful
//! of requirement documents and rubrics), so ranking is done in-process with
//! cosine similarity over the whole collection.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::{Embedder, LlmError};

pub mod defaults;
pub mod retrieval;

pub const JOB_COLLECTION: &str = "job_descriptions";
pub const RUBRIC_COLLECTION: &str = "scoring_rubrics";

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] LlmError),
}

/// A stored document together with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub id: String,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, sqlx::FromRow)]
struct StoredDocument {
    id: String,
    content: String,
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct VectorStore {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(pool: PgPool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Ids of every document stored in `collection`.
    pub async fn ids(&self, collection: &str) -> Result<Vec<String>, VectorStoreError> {
        Ok(sqlx::query_scalar(
            "SELECT id FROM vector_documents WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Embeds `content` and inserts or replaces the document `id`.
    pub async fn upsert(
        &self,
        collection: &str,
        id: &str,
        content: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), VectorStoreError> {
        let embedding = self.embedder.embed(content).await?;
        sqlx::query(
            r#"
            INSERT INTO vector_documents (collection, id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (collection, id)
            DO UPDATE SET content = EXCLUDED.content,
                          metadata = EXCLUDED.metadata,
                          embedding = EXCLUDED.embedding
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(content)
        .bind(metadata)
        .bind(&embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns the `n` documents in `collection` most similar to `text`.
    pub async fn query(
        &self,
        collection: &str,
        text: &str,
        n: usize,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError> {
        let documents = sqlx::query_as::<_, StoredDocument>(
            "SELECT id, content, embedding FROM vector_documents WHERE collection = $1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        if documents.is_empty() {
            return Ok(vec![]);
        }

        let query_embedding = self.embedder.embed(text).await?;
        let ranked = rank_documents(&query_embedding, documents, n);
        debug!(
            "Vector query on {collection} returned {} of n={n} documents",
            ranked.len()
        );
        Ok(ranked)
    }
}

fn rank_documents(query: &[f32], documents: Vec<StoredDocument>, n: usize) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = documents
        .into_iter()
        .map(|d| ScoredDocument {
            score: cosine_similarity(query, &d.embedding),
            id: d.id,
            content: d.content,
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(n);
    scored
}

/// Cosine similarity in `[-1, 1]`. Mismatched dimensions or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, embedding: Vec<f32>) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            content: format!("{id} content"),
            embedding,
        }
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_by_similarity_and_truncates() {
        let docs = vec![
            doc("fullstack_dev", vec![0.0, 1.0]),
            doc("backend_dev", vec![1.0, 0.1]),
            doc("ai_ml_engineer", vec![0.7, 0.7]),
        ];
        let ranked = rank_documents(&[1.0, 0.0], docs, 2);
        let ids: Vec<_> = ranked.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["backend_dev", "ai_ml_engineer"]);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_rank_ties_broken_by_id() {
        let docs = vec![doc("b", vec![1.0, 0.0]), doc("a", vec![2.0, 0.0])];
        let ranked = rank_documents(&[1.0, 0.0], docs, 5);
        assert_eq!(ranked[0].id, "a");
        assert_eq!(ranked.len(), 2);
    }
}
