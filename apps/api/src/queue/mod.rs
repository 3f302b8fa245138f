//! Redis-backed reliable job queue for evaluations.
//!
//! - `pending`: list producers `LPUSH` onto.
//! - `processing`: list a worker atomically moves its job into (`BRPOPLPUSH`)
//!   and removes it from (`LREM`) once the job is settled.
//! - `delayed`: sorted set of retries scored by due time (unix millis).
//! - `dead`: list of jobs that exhausted their retries.
//!
//! Anything left in `processing` after a crash is pushed back onto `pending`
//! by `recover_orphans` when the worker pool starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::Script;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

pub mod worker;

const KEY_PREFIX: &str = "evaluator:evaluations:";
/// Upper bound on delayed jobs moved per promoter tick.
const PROMOTE_BATCH: isize = 100;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Payload stored in Redis. Inputs are loaded from the evaluation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub evaluation_id: Uuid,
    /// Delivery number of this payload, starting at 1.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl EvaluationJob {
    pub fn new(evaluation_id: Uuid) -> Self {
        Self {
            evaluation_id,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            evaluation_id: self.evaluation_id,
            attempt: self.attempt + 1,
            enqueued_at: Utc::now(),
        }
    }
}

/// A dequeued job plus the exact payload string, which `LREM` needs to ack it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: EvaluationJob,
    pub raw: String,
}

#[derive(Debug, Serialize)]
struct DeadJob<'a> {
    #[serde(flatten)]
    job: &'a EvaluationJob,
    error: &'a str,
    failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub pending: u64,
    pub processing: u64,
    pub delayed: u64,
    pub dead: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueKeys {
    pending: String,
    processing: String,
    delayed: String,
    dead: String,
}

impl QueueKeys {
    fn new(prefix: &str) -> Self {
        Self {
            pending: format!("{prefix}pending"),
            processing: format!("{prefix}processing"),
            delayed: format!("{prefix}delayed"),
            dead: format!("{prefix}dead"),
        }
    }
}

/// Due time of a retry, as the `delayed` sorted-set score.
fn due_score(now: DateTime<Utc>, delay: Duration) -> i64 {
    now.timestamp_millis() + delay.as_millis() as i64
}

#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    keys: QueueKeys,
}

impl JobQueue {
    /// Parses the URL only; the shared connection is opened on first use.
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        Self::with_prefix(redis_url, KEY_PREFIX)
    }

    /// Same as `new`, with every key under `prefix` instead of the default.
    pub fn with_prefix(redis_url: &str, prefix: &str) -> Result<Self, QueueError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            conn: Arc::new(OnceCell::new()),
            keys: QueueKeys::new(prefix),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager, QueueError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }

    /// A connection of its own for blocking dequeues, so a waiting worker
    /// never stalls commands issued on the shared connection.
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn enqueue(&self, job: &EvaluationJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn().await?;
        redis::cmd("LPUSH")
            .arg(&self.keys.pending)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    /// Blocks up to `timeout` (whole seconds, at least one) for the next job.
    /// A payload that cannot be decoded is dead-lettered and `None` returned.
    pub async fn dequeue(
        &self,
        conn: &mut MultiplexedConnection,
        timeout: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        let raw: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(&self.keys.pending)
            .arg(&self.keys.processing)
            .arg(timeout.as_secs().max(1))
            .query_async(conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<EvaluationJob>(&raw) {
            Ok(job) => Ok(Some(Delivery { job, raw })),
            Err(e) => {
                warn!("Discarding undecodable job payload: {e}");
                let mut shared = self.conn().await?;
                redis::pipe()
                    .atomic()
                    .cmd("LPUSH")
                    .arg(&self.keys.dead)
                    .arg(&raw)
                    .ignore()
                    .cmd("LREM")
                    .arg(&self.keys.processing)
                    .arg(1)
                    .arg(&raw)
                    .ignore()
                    .query_async::<_, ()>(&mut shared)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Removes a settled delivery from `processing`.
    pub async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        redis::cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(&delivery.raw)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    /// Schedules the next attempt after `delay` and acks the current one.
    pub async fn retry_later(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&delivery.job.next_attempt())?;
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&self.keys.delayed)
            .arg(due_score(Utc::now(), delay))
            .arg(payload)
            .ignore()
            .cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(&delivery.raw)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Moves due retries back onto `pending`. Each member is removed from
    /// `delayed` and pushed in one script run, so a crash cannot drop it.
    pub async fn promote_due(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn().await?;
        let script = Script::new(
            r#"
            local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
            for _, payload in ipairs(due) do
                redis.call('ZREM', KEYS[1], payload)
                redis.call('LPUSH', KEYS[2], payload)
            end
            return #due
        "#,
        );
        let promoted: i64 = script
            .key(&self.keys.delayed)
            .key(&self.keys.pending)
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;
        Ok(promoted.max(0) as usize)
    }

    /// Parks a job that exhausted its retries and acks it.
    pub async fn dead_letter(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&DeadJob {
            job: &delivery.job,
            error,
            failed_at: Utc::now(),
        })?;
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("LPUSH")
            .arg(&self.keys.dead)
            .arg(payload)
            .ignore()
            .cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(&delivery.raw)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Pushes every job stranded in `processing` back onto `pending`.
    /// Call once before any worker of this deployment starts dequeuing.
    pub async fn recover_orphans(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn().await?;
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&self.keys.processing)
                .arg(&self.keys.pending)
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            info!("Recovered {recovered} orphaned jobs from the processing list");
        }
        Ok(recovered)
    }

    pub async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let mut conn = self.conn().await?;
        let (pending, processing, delayed, dead): (u64, u64, u64, u64) = redis::pipe()
            .cmd("LLEN")
            .arg(&self.keys.pending)
            .cmd("LLEN")
            .arg(&self.keys.processing)
            .cmd("ZCARD")
            .arg(&self.keys.delayed)
            .cmd("LLEN")
            .arg(&self.keys.dead)
            .query_async(&mut conn)
            .await?;
        Ok(QueueDepth {
            pending,
            processing,
            delayed,
            dead,
        })
    }
}
