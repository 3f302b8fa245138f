use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::job_templates::repository as templates;
use crate::state::AppState;
use crate::uploads::extract::{extract_text, preview, DocumentKind, ExtractError};
use crate::uploads::storage::{archive_upload, upload_key};

/// Preview length returned for each uploaded document.
const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Serialize)]
pub struct TemplateOption {
    pub id: Uuid,
    pub title: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub upload_id: Uuid,
    pub cv_preview: String,
    pub project_preview: String,
    pub cv_length: usize,
    pub project_length: usize,
    pub available_job_templates: Vec<TemplateOption>,
}

/// A validated file pulled out of the multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub field: &'static str,
    pub filename: String,
    pub kind: DocumentKind,
    pub data: Bytes,
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        AppError::Validation(e.to_string())
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Checks the declared filename and the size of one uploaded file.
pub fn validate_file(
    field: &'static str,
    filename: Option<&str>,
    data: Bytes,
    max_file_size: usize,
) -> Result<UploadedFile, AppError> {
    let filename = filename.unwrap_or_default().to_string();
    let kind = DocumentKind::from_filename(&filename)?;
    if data.len() > max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "{field} exceeds the maximum size of {max_file_size} bytes"
        )));
    }
    Ok(UploadedFile {
        field,
        filename,
        kind,
        data,
    })
}

async fn extract_in_background(file: &UploadedFile) -> Result<String, AppError> {
    let kind = file.kind;
    let data = file.data.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(kind, &data))
        .await
        .map_err(|e| AppError::Validation(format!("Failed to extract text: {e}")))??;
    info!(
        "Extracted {} characters from {} ({})",
        text.chars().count(),
        file.filename,
        file.field
    );
    Ok(text)
}

/// POST /api/upload
///
/// Multipart with `cv_file` and `project_file`. Extracts both documents,
/// archives the originals and returns previews plus the selectable job templates.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max_file_size = state.config.max_file_size;
    let mut cv_file: Option<UploadedFile> = None;
    let mut project_file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let slot = match field.name() {
            Some("cv_file") => ("cv_file", &mut cv_file),
            Some("project_file") => ("project_file", &mut project_file),
            _ => continue,
        };
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        *slot.1 = Some(validate_file(slot.0, filename.as_deref(), data, max_file_size)?);
    }

    let cv_file =
        cv_file.ok_or_else(|| AppError::Validation("cv_file is required".to_string()))?;
    let project_file = project_file
        .ok_or_else(|| AppError::Validation("project_file is required".to_string()))?;

    info!(
        "Upload request - CV: {}, Project: {}",
        cv_file.filename, project_file.filename
    );

    let cv_content = extract_in_background(&cv_file).await?;
    let project_content = extract_in_background(&project_file).await?;

    let upload_id = Uuid::new_v4();
    for (role, file) in [("cv", &cv_file), ("project", &project_file)] {
        let key = upload_key(upload_id, role, file.kind);
        archive_upload(
            &state.s3,
            &state.config.s3_bucket,
            &key,
            file.kind,
            file.data.clone(),
        )
        .await?;
    }

    let available_job_templates = templates::list_active(&state.db)
        .await?
        .into_iter()
        .map(|t| TemplateOption {
            id: t.id,
            title: t.title,
            category: t.category,
        })
        .collect();

    info!("File upload {upload_id} completed successfully");

    Ok(Json(UploadResponse {
        message: "Files uploaded and processed successfully".to_string(),
        upload_id,
        cv_preview: preview(&cv_content, PREVIEW_CHARS),
        project_preview: preview(&project_content, PREVIEW_CHARS),
        cv_length: cv_content.chars().count(),
        project_length: project_content.chars().count(),
        available_job_templates,
    }))
}
