use sqlx::PgPool;
use uuid::Uuid;

use crate::models::job_template::JobTemplateRow;

/// Fields needed to insert a template; `created_at` is set by the database.
#[derive(Debug, Clone)]
pub struct NewJobTemplate<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub category: &'a str,
    pub description: &'a str,
    pub requirements: &'a str,
    pub is_active: bool,
}

/// Returns all active templates, oldest first.
pub async fn list_active(pool: &PgPool) -> Result<Vec<JobTemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, JobTemplateRow>(
        "SELECT * FROM job_templates WHERE is_active = TRUE ORDER BY created_at ASC, title ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<JobTemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, JobTemplateRow>("SELECT * FROM job_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM job_templates")
        .fetch_one(pool)
        .await
}

/// Inserts the template unless its id already exists. Returns whether a row was written.
pub async fn insert(pool: &PgPool, template: &NewJobTemplate<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO job_templates (id, title, category, description, requirements, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(template.id)
    .bind(template.title)
    .bind(template.category)
    .bind(template.description)
    .bind(template.requirements)
    .bind(template.is_active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
