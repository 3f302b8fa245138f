use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which halves of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRole {
    All,
    Api,
    Worker,
}

impl AppRole {
    pub fn serves_http(self) -> bool {
        matches!(self, AppRole::All | AppRole::Api)
    }

    pub fn runs_workers(self) -> bool {
        matches!(self, AppRole::All | AppRole::Worker)
    }
}

impl FromStr for AppRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(AppRole::All),
            "api" => Ok(AppRole::Api),
            "worker" => Ok(AppRole::Worker),
            other => bail!("APP_ROLE must be one of all, api, worker (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub llm_temperature: f32,
    pub port: u16,
    pub rust_log: String,
    /// `None` means any origin.
    pub allow_origins: Option<Vec<String>>,
    pub max_file_size: usize,
    pub app_role: AppRole,
    pub worker_concurrency: usize,
    pub job_max_retries: u32,
    pub job_retry_delay: Duration,
    pub job_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let llm_api_key = match lookup("LLM_API_KEY").filter(|v| !v.trim().is_empty()) {
            Some(key) => key,
            None => require("OPENAI_API_KEY")
                .context("Set LLM_API_KEY (or OPENAI_API_KEY) for the model provider")?,
        };

        let allow_origins = match lookup("ALLOW_ORIGINS") {
            None => None,
            Some(raw) if raw.trim() == "*" || raw.trim().is_empty() => None,
            Some(raw) => Some(
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            db_max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            redis_url: require("REDIS_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            s3_region: or_default("S3_REGION", "us-east-1"),
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            llm_api_key,
            llm_base_url: or_default("LLM_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            llm_model: or_default("LLM_MODEL", "gpt-4o-mini"),
            embedding_model: or_default("EMBEDDING_MODEL", "text-embedding-3-small"),
            llm_temperature: parse_var(&lookup, "LLM_TEMPERATURE", 0.3)?,
            port: parse_var(&lookup, "PORT", 8000)?,
            rust_log: or_default("RUST_LOG", "info"),
            allow_origins,
            max_file_size: parse_var(&lookup, "MAX_FILE_SIZE", 10 * 1024 * 1024)?,
            app_role: parse_var(&lookup, "APP_ROLE", AppRole::All)?,
            worker_concurrency: parse_var::<usize, _>(&lookup, "WORKER_CONCURRENCY", 2)?.max(1),
            job_max_retries: parse_var(&lookup, "JOB_MAX_RETRIES", 3)?,
            job_retry_delay: Duration::from_secs(parse_var(&lookup, "JOB_RETRY_DELAY_SECS", 60)?),
            job_timeout: Duration::from_secs(parse_var(&lookup, "JOB_TIMEOUT_SECS", 600)?),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Minimal valid config pointing at local services; nothing is contacted.
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| {
            match key {
                "DATABASE_URL" => Some("postgres://localhost/evaluator"),
                "REDIS_URL" => Some("redis://127.0.0.1:6379"),
                "S3_BUCKET" => Some("uploads"),
                "S3_ENDPOINT" => Some("http://localhost:9000"),
                "AWS_ACCESS_KEY_ID" => Some("minio"),
                "AWS_SECRET_ACCESS_KEY" => Some("minio123"),
                "LLM_API_KEY" => Some("sk-test"),
                _ => None,
            }
            .map(String::from)
        })
        .unwrap()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ('{raw}'): {e}")),
    }
}
