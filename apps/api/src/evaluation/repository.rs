use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::evaluation::{EvaluationRow, EvaluationStatus};

/// Fields captured when an evaluation is submitted.
#[derive(Debug, Clone)]
pub struct NewEvaluation<'a> {
    pub cv_content: &'a str,
    pub project_content: &'a str,
    pub job_description: &'a str,
    pub job_template_id: Option<Uuid>,
}

/// Inserts a `queued` evaluation and returns its id.
pub async fn create(pool: &PgPool, evaluation: &NewEvaluation<'_>) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO evaluations (id, status, cv_content, project_content, job_description, job_template_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(EvaluationStatus::Queued.as_str())
    .bind(evaluation.cv_content)
    .bind(evaluation.project_content)
    .bind(evaluation.job_description)
    .bind(evaluation.job_template_id)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<EvaluationRow>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationRow>("SELECT * FROM evaluations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns false when no row had that id.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM evaluations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// Every status-changing statement below is guarded by `status = ANY($n)`
// with the target status's allowed predecessors, so a terminal row is
// never overwritten and a deleted row simply matches nothing.

/// Moves the row into `processing` and counts the attempt.
/// `None` means the evaluation is terminal or gone and the job should be dropped.
pub async fn mark_processing(pool: &PgPool, id: Uuid) -> Result<Option<EvaluationRow>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationRow>(
        r#"
        UPDATE evaluations
        SET status = $2, attempts = attempts + 1, updated_at = NOW()
        WHERE id = $1 AND status = ANY($3)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(EvaluationStatus::Processing.as_str())
    .bind(EvaluationStatus::Processing.allowed_predecessors())
    .fetch_optional(pool)
    .await
}

/// Records a failed attempt that will be retried; status stays `processing`.
pub async fn record_retry(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE evaluations
        SET error_message = $2, updated_at = NOW()
        WHERE id = $1 AND status = ANY($3)
        "#,
    )
    .bind(id)
    .bind(error)
    .bind(EvaluationStatus::Processing.allowed_predecessors())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Stores the result; `processing_time` is the seconds elapsed since submission.
pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    result: &Value,
    cv_extraction: &Value,
) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        r#"
        UPDATE evaluations
        SET status = $2,
            result = $3,
            cv_extraction = $4,
            error_message = NULL,
            processing_time = EXTRACT(EPOCH FROM (NOW() - created_at))::DOUBLE PRECISION,
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($5)
        "#,
    )
    .bind(id)
    .bind(EvaluationStatus::Completed.as_str())
    .bind(result)
    .bind(cv_extraction)
    .bind(EvaluationStatus::Completed.allowed_predecessors())
    .execute(pool)
    .await?;
    Ok(outcome.rows_affected() > 0)
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        r#"
        UPDATE evaluations
        SET status = $2,
            error_message = $3,
            processing_time = EXTRACT(EPOCH FROM (NOW() - created_at))::DOUBLE PRECISION,
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($4)
        "#,
    )
    .bind(id)
    .bind(EvaluationStatus::Failed.as_str())
    .bind(error)
    .bind(EvaluationStatus::Failed.allowed_predecessors())
    .execute(pool)
    .await?;
    Ok(outcome.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;
    use serde_json::json;

    async fn queued(pool: &PgPool) -> Uuid {
        create(
            pool,
            &NewEvaluation {
                cv_content: "cv",
                project_content: "project",
                job_description: "Backend role",
                job_template_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore] // needs TEST_DATABASE_URL
    async fn test_processing_counts_attempts_and_completes() {
        let pool = test_pool().await;
        let id = queued(&pool).await;

        let row = mark_processing(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status(), EvaluationStatus::Processing);
        assert_eq!(row.attempts, 1);
        assert!(record_retry(&pool, id, "rate limited").await.unwrap());
        assert_eq!(
            mark_processing(&pool, id).await.unwrap().unwrap().attempts,
            2
        );

        let result = json!({ "cv_match_rate": 0.8 });
        let extraction = json!({ "fullname": "Jane Doe" });
        assert!(mark_completed(&pool, id, &result, &extraction).await.unwrap());

        let row = get(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status(), EvaluationStatus::Completed);
        assert_eq!(row.result, Some(result));
        assert!(row.error_message.is_none());
        assert!(row.processing_time.is_some());
        delete(&pool, id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // needs TEST_DATABASE_URL
    async fn test_terminal_rows_never_change() {
        let pool = test_pool().await;
        let id = queued(&pool).await;
        mark_processing(&pool, id).await.unwrap().unwrap();
        assert!(mark_failed(&pool, id, "gave up").await.unwrap());

        let result = json!({ "cv_match_rate": 0.8 });
        assert!(!mark_completed(&pool, id, &result, &json!({})).await.unwrap());
        assert!(!record_retry(&pool, id, "late retry").await.unwrap());
        assert!(!mark_failed(&pool, id, "again").await.unwrap());
        assert!(mark_processing(&pool, id).await.unwrap().is_none());

        let row = get(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status(), EvaluationStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("gave up"));
        assert_eq!(row.attempts, 1);
        assert!(row.result.is_none());
    }

    #[tokio::test]
    #[ignore] // needs TEST_DATABASE_URL
    async fn test_delete_reports_missing_rows() {
        let pool = test_pool().await;
        let id = queued(&pool).await;
        assert!(delete(&pool, id).await.unwrap());
        assert!(!delete(&pool, id).await.unwrap());
        assert!(get(&pool, id).await.unwrap().is_none());
        assert!(mark_processing(&pool, id).await.unwrap().is_none());
    }
}
