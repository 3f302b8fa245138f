pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers as evaluation;
use crate::job_templates::handlers as job_templates;
use crate::state::AppState;
use crate::uploads::handlers as uploads;

/// Slack on top of the two files for multipart framing and small fields.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size * 2 + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/api/upload", post(uploads::handle_upload))
        .route("/api/evaluate", post(evaluation::handle_evaluate))
        .route(
            "/api/result/:id",
            get(evaluation::handle_get_result).delete(evaluation::handle_delete_result),
        )
        .route(
            "/api/result/:id/cv-extraction",
            get(evaluation::handle_get_cv_extraction),
        )
        .route("/api/job-templates", get(job_templates::handle_list_templates))
        .route(
            "/api/job-templates/:id",
            get(job_templates::handle_get_template),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::queue::JobQueue;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// State whose pool, queue and S3 client are never contacted unless a
    /// handler gets past validation.
    fn test_state() -> AppState {
        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let queue = JobQueue::new(&config.redis_url).unwrap();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("minio", "minio123", None, None, "test"))
            .endpoint_url(&config.s3_endpoint)
            .build();
        AppState {
            db,
            queue,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            config,
        }
    }

    async fn send(request: Request<Body>) -> Response {
        build_router(test_state()).oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn evaluate_request(body: Value) -> Request<Body> {
        Request::post("/api/evaluate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_reports_healthy() {
        let response = send(Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "AI Resume Evaluator API");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_evaluate_rejects_short_cv() {
        let response = send(evaluate_request(json!({
            "cv_content": "too short",
            "project_content": "A project report that is comfortably longer than fifty characters.",
            "job_description": "Backend Developer"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "CV content too short");
    }

    #[tokio::test]
    async fn test_evaluate_requires_job_source() {
        let long = "x".repeat(60);
        let response = send(evaluate_request(json!({
            "cv_content": long,
            "project_content": long
        })))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_evaluate_malformed_template_id_is_404() {
        let long = "x".repeat(60);
        let response = send(evaluate_request(json!({
            "cv_content": long,
            "project_content": long,
            "job_template_id": "backend"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Job template not found");
    }

    async fn assert_not_found(request: Request<Body>, message: &str) {
        let response = send(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], message);
    }

    #[tokio::test]
    async fn test_malformed_ids_are_404_envelopes() {
        assert_not_found(
            Request::get("/api/result/abc").body(Body::empty()).unwrap(),
            "Evaluation not found",
        )
        .await;
        assert_not_found(
            Request::get("/api/result/abc/cv-extraction")
                .body(Body::empty())
                .unwrap(),
            "Evaluation not found",
        )
        .await;
        assert_not_found(
            Request::delete("/api/result/abc").body(Body::empty()).unwrap(),
            "Evaluation not found",
        )
        .await;
        assert_not_found(
            Request::get("/api/job-templates/backend")
                .body(Body::empty())
                .unwrap(),
            "Job template not found",
        )
        .await;
    }

    #[tokio::test]
    async fn test_unknown_template_reported_before_short_content() {
        let response = send(evaluate_request(json!({
            "cv_content": "short",
            "project_content": "short",
            "job_template_id": "backend"
        })))
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_field_is_422_envelope() {
        let response = send(evaluate_request(json!({ "cv_content": "x" }))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("project_content"));
    }

    #[tokio::test]
    async fn test_broken_json_is_400_envelope() {
        let response = send(
            Request::post("/api/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_enveloped() {
        let response = send(
            Request::post("/api/evaluate")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_file_type() {
        let boundary = "evaluator-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"cv_file\"; filename=\"resume.exe\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             MZ\r\n\
             --{boundary}--\r\n"
        );
        let response = send(
            Request::post("/api/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains(".pdf"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = send(Request::get("/api/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
