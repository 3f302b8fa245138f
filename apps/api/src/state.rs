use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::queue::JobQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Producer side of the evaluation queue.
    pub queue: JobQueue,
    pub s3: S3Client,
    pub config: Config,
}
