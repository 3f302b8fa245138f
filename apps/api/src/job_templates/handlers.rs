use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::job_templates::repository;
use crate::models::job_template::JobTemplateRow;
use crate::state::AppState;
use crate::uploads::extract::preview;

/// Description length shown in the template listing.
const LIST_DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct JobTemplateSummary {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
}

impl From<JobTemplateRow> for JobTemplateSummary {
    fn from(row: JobTemplateRow) -> Self {
        Self {
            id: row.id,
            description: preview(&row.description, LIST_DESCRIPTION_CHARS),
            title: row.title,
            category: row.category,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobTemplateDetail {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub requirements: String,
}

/// GET /api/job-templates
pub async fn handle_list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobTemplateSummary>>, AppError> {
    let templates = repository::list_active(&state.db).await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

/// GET /api/job-templates/:id
pub async fn handle_get_template(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<JobTemplateDetail>, AppError> {
    let not_found = || AppError::NotFound("Job template not found".to_string());
    let id = Uuid::parse_str(raw_id.trim()).map_err(|_| not_found())?;
    let template = repository::get(&state.db, id).await?.ok_or_else(not_found)?;

    Ok(Json(JobTemplateDetail {
        id: template.id,
        title: template.title,
        category: template.category,
        description: template.description,
        requirements: template.requirements,
    }))
}
