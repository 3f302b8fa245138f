mod config;
mod db;
mod errors;
mod evaluation;
mod job_templates;
mod llm_client;
mod models;
mod queue;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod uploads;
mod vector_store;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::evaluation::pipeline::EvaluationPipeline;
use crate::llm_client::LlmClient;
use crate::queue::worker::{WorkerPool, WorkerSettings};
use crate::queue::JobQueue;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vector_store::VectorStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Evaluator v{} (role: {:?})",
        env!("CARGO_PKG_VERSION"),
        config.app_role
    );

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;
    job_templates::seed::seed_default_templates(&db).await?;

    // Initialize Redis queue
    let queue = JobQueue::new(&config.redis_url)?;
    info!("Redis queue client initialized");

    let workers = if config.app_role.runs_workers() {
        let llm = Arc::new(LlmClient::new(
            config.llm_api_key.clone(),
            config.llm_base_url.clone(),
            config.llm_model.clone(),
            config.embedding_model.clone(),
            config.llm_temperature,
        )?);
        info!("LLM client initialized (model: {})", llm.model());

        let store = VectorStore::new(db.clone(), llm.clone());
        vector_store::defaults::ensure_seeded(&store).await;

        let pipeline = EvaluationPipeline::new(llm, Arc::new(store));
        Some(
            WorkerPool::start(
                db.clone(),
                queue.clone(),
                pipeline,
                WorkerSettings::from_config(&config),
            )
            .await?,
        )
    } else {
        None
    };

    if config.app_role.serves_http() {
        // Initialize S3 / MinIO
        let s3 = build_s3_client(&config).await;
        info!("S3 client initialized");

        let cors = cors_layer(&config);
        let state = AppState {
            db,
            queue,
            s3,
            config: config.clone(),
        };

        let app = build_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
        info!("Listening on {addr}");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    if let Some(workers) = workers {
        workers.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// `*` (the default) allows any origin; otherwise only the listed ones.
fn cors_layer(config: &Config) -> CorsLayer {
    match &config.allow_origins {
        None => CorsLayer::permissive(),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin '{o}'");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "evaluator-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
