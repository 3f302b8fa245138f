use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::{AppError, AppJson};
use crate::evaluation::repository::{self, NewEvaluation};
use crate::job_templates::repository as templates;
use crate::models::evaluation::{EvaluationRow, EvaluationStatus};
use crate::queue::EvaluationJob;
use crate::state::AppState;

/// Minimum trimmed length, in characters, of the CV and project texts.
pub const MIN_CONTENT_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub cv_content: String,
    pub project_content: String,
    #[serde(default)]
    pub job_description: Option<String>,
    /// Kept as text: a blank id means "not given", a malformed one is an unknown template.
    #[serde(default)]
    pub job_template_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub id: Uuid,
    pub status: EvaluationStatus,
}

/// Where the job description for an evaluation comes from.
#[derive(Debug, PartialEq)]
pub enum JobSource {
    Template(Uuid),
    Custom(String),
}

fn too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_CONTENT_CHARS
}

fn template_not_found() -> AppError {
    AppError::NotFound("Job template not found".to_string())
}

/// Decides where the job description comes from. A template id takes
/// precedence over a free-text description.
pub fn job_source(request: &EvaluateRequest) -> Result<JobSource, AppError> {
    let template_id = request
        .job_template_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    if let Some(id) = template_id {
        return Uuid::parse_str(id)
            .map(JobSource::Template)
            .map_err(|_| template_not_found());
    }

    match request
        .job_description
        .as_deref()
        .map(str::trim)
        .filter(|jd| !jd.is_empty())
    {
        Some(jd) => Ok(JobSource::Custom(jd.to_string())),
        None => Err(AppError::Validation(
            "Either job_description or job_template_id must be provided".to_string(),
        )),
    }
}

/// Runs after the job source is resolved, so an unknown template wins over short content.
pub fn validate_contents(request: &EvaluateRequest) -> Result<(), AppError> {
    if too_short(&request.cv_content) {
        return Err(AppError::Validation("CV content too short".to_string()));
    }
    if too_short(&request.project_content) {
        return Err(AppError::Validation("Project content too short".to_string()));
    }
    Ok(())
}

fn evaluation_not_found() -> AppError {
    AppError::NotFound("Evaluation not found".to_string())
}

/// Unparseable ids are reported the same way as unknown ones.
fn parse_evaluation_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| evaluation_not_found())
}

/// POST /api/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    AppJson(request): AppJson<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let (job_description, job_template_id) = match job_source(&request)? {
        JobSource::Template(id) => {
            let template = templates::get(&state.db, id)
                .await?
                .ok_or_else(template_not_found)?;
            info!("Using job template: {}", template.title);
            (template.job_description(), Some(id))
        }
        JobSource::Custom(text) => (text, None),
    };
    validate_contents(&request)?;

    let id = repository::create(
        &state.db,
        &NewEvaluation {
            cv_content: request.cv_content.trim(),
            project_content: request.project_content.trim(),
            job_description: &job_description,
            job_template_id,
        },
    )
    .await?;

    if let Err(e) = state.queue.enqueue(&EvaluationJob::new(id)).await {
        error!("Failed to enqueue evaluation {id}: {e}");
        repository::mark_failed(&state.db, id, "Failed to queue evaluation").await?;
        return Err(e.into());
    }

    info!("Evaluation {id} queued");
    Ok(Json(EvaluateResponse {
        id,
        status: EvaluationStatus::Queued,
    }))
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub id: Uuid,
    pub status: EvaluationStatus,
    pub created_at: DateTime<Utc>,
    pub processing_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<EvaluationRow> for ResultResponse {
    fn from(row: EvaluationRow) -> Self {
        let status = row.status();
        let result = match (status, row.result) {
            (EvaluationStatus::Completed, Some(mut result)) => {
                if let (Value::Object(map), Some(extraction)) = (&mut result, row.cv_extraction) {
                    map.insert("cv_extraction".to_string(), extraction);
                }
                Some(result)
            }
            _ => None,
        };
        let error = match status {
            EvaluationStatus::Failed => Some(
                row.error_message
                    .unwrap_or_else(|| "Evaluation failed".to_string()),
            ),
            _ => None,
        };

        Self {
            id: row.id,
            status,
            created_at: row.created_at,
            processing_time: row.processing_time,
            result,
            error,
        }
    }
}

async fn load(state: &AppState, raw_id: &str) -> Result<EvaluationRow, AppError> {
    let id = parse_evaluation_id(raw_id)?;
    repository::get(&state.db, id)
        .await?
        .ok_or_else(evaluation_not_found)
}

/// GET /api/result/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, AppError> {
    Ok(Json(load(&state, &id).await?.into()))
}

pub fn cv_extraction_body(row: EvaluationRow) -> Value {
    let status = row.status();
    match row.cv_extraction {
        Some(extraction) => json!({ "extraction": extraction, "status": status }),
        None => json!({ "message": "CV extraction not yet available" }),
    }
}

/// GET /api/result/:id/cv-extraction
pub async fn handle_get_cv_extraction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(cv_extraction_body(load(&state, &id).await?)))
}

/// DELETE /api/result/:id
pub async fn handle_delete_result(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_evaluation_id(&raw_id)?;
    if !repository::delete(&state.db, id).await? {
        return Err(evaluation_not_found());
    }
    info!("Evaluation {id} deleted");
    Ok(Json(json!({
        "message": "Evaluation deleted successfully",
        "id": id
    })))
}
