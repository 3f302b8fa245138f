use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::evaluation::models::EvaluationResult;
use crate::evaluation::pipeline::{EvaluationInput, EvaluationPipeline};
use crate::evaluation::repository;
use crate::queue::{Delivery, JobQueue, QueueError};

/// How long one `BRPOPLPUSH` waits before the worker re-checks for shutdown.
const POLL_TIMEOUT: Duration = Duration::from_secs(2);
const PROMOTE_INTERVAL: Duration = Duration::from_secs(1);
/// Pause after a Redis error before reconnecting.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub job_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.worker_concurrency.max(1),
            max_retries: config.job_max_retries,
            retry_delay: config.job_retry_delay,
            job_timeout: config.job_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry,
    GiveUp,
}

/// `attempts` counts the attempt that just failed; the first run is 1.
/// A job gets `max_retries` further attempts after its first.
pub fn decide_failure(attempts: i32, max_retries: u32) -> FailureAction {
    if i64::from(attempts) <= i64::from(max_retries) {
        FailureAction::Retry
    } else {
        FailureAction::GiveUp
    }
}

/// Running workers plus the delayed-job promoter.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Requeues orphaned jobs, then spawns `concurrency` workers and the promoter.
    pub async fn start(
        db: PgPool,
        queue: JobQueue,
        pipeline: EvaluationPipeline,
        settings: WorkerSettings,
    ) -> Result<Self, QueueError> {
        queue.recover_orphans().await?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(settings.concurrency + 1);

        for index in 0..settings.concurrency {
            let worker = Worker {
                index,
                db: db.clone(),
                queue: queue.clone(),
                pipeline: pipeline.clone(),
                settings,
            };
            let conn = queue.dedicated_connection().await?;
            handles.push(tokio::spawn(worker.run(conn, shutdown_rx.clone())));
        }
        handles.push(tokio::spawn(run_promoter(queue, shutdown_rx)));

        info!(
            "Worker pool started: {} workers, {} retries, {}s timeout",
            settings.concurrency,
            settings.max_retries,
            settings.job_timeout.as_secs()
        );
        Ok(Self { handles, shutdown })
    }

    /// Signals shutdown and waits for every worker to finish its current job.
    pub async fn shutdown(self) {
        info!("Stopping worker pool");
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task ended abnormally: {e}");
            }
        }
        info!("Worker pool stopped");
    }
}

struct Worker {
    index: usize,
    db: PgPool,
    queue: JobQueue,
    pipeline: EvaluationPipeline,
    settings: WorkerSettings,
}

impl Worker {
    async fn run(
        self,
        mut conn: redis::aio::MultiplexedConnection,
        shutdown: watch::Receiver<bool>,
    ) {
        info!("Worker {} ready", self.index);
        while !*shutdown.borrow() {
            match self.queue.dequeue(&mut conn, POLL_TIMEOUT).await {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => {}
                Err(e) => {
                    error!("Worker {} failed to dequeue: {e}", self.index);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    match self.queue.dedicated_connection().await {
                        Ok(fresh) => conn = fresh,
                        Err(e) => warn!("Worker {} could not reconnect: {e}", self.index),
                    }
                }
            }
        }
        info!("Worker {} exiting", self.index);
    }

    async fn process(&self, delivery: Delivery) {
        let id = delivery.job.evaluation_id;

        let row = match repository::mark_processing(&self.db, id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                info!("[{id}] Evaluation is finished or deleted, dropping job");
                self.ack(&delivery).await;
                return;
            }
            Err(e) => {
                // The attempt was never counted, so this does not spend a retry.
                error!("[{id}] Could not claim evaluation: {e}");
                if let Err(e) = self
                    .queue
                    .retry_later(&delivery, self.settings.retry_delay)
                    .await
                {
                    error!("[{id}] Could not reschedule job: {e}");
                }
                return;
            }
        };

        info!(
            "[{id}] Starting evaluation (attempt {}, delivery {})",
            row.attempts, delivery.job.attempt
        );
        let input = EvaluationInput {
            cv_content: row.cv_content,
            project_content: row.project_content,
            job_description: row.job_description,
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(
            self.settings.job_timeout,
            self.pipeline.run(id, &input),
        )
        .await
        {
            Ok(Ok(result)) => self.complete(id, &result).await,
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "Evaluation timed out after {}s",
                self.settings.job_timeout.as_secs()
            )),
        };

        match outcome {
            Ok(()) => {
                info!(
                    "[{id}] Evaluation completed in {:.1}s",
                    started.elapsed().as_secs_f64()
                );
                self.ack(&delivery).await;
            }
            Err(message) => self.fail(&delivery, row.attempts, &message).await,
        }
    }

    async fn complete(&self, id: uuid::Uuid, result: &EvaluationResult) -> Result<(), String> {
        let result_json = serde_json::to_value(result).map_err(|e| e.to_string())?;
        let extraction_json =
            serde_json::to_value(&result.cv_extraction).map_err(|e| e.to_string())?;
        match repository::mark_completed(&self.db, id, &result_json, &extraction_json).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("[{id}] Evaluation left processing while running, result discarded");
                Ok(())
            }
            Err(e) => Err(format!("Failed to store result: {e}")),
        }
    }

    async fn fail(&self, delivery: &Delivery, attempts: i32, message: &str) {
        let id = delivery.job.evaluation_id;
        match decide_failure(attempts, self.settings.max_retries) {
            FailureAction::Retry => {
                warn!(
                    "[{id}] Attempt {attempts} failed, retrying in {}s: {message}",
                    self.settings.retry_delay.as_secs()
                );
                if let Err(e) = repository::record_retry(&self.db, id, message).await {
                    error!("[{id}] Could not record retry: {e}");
                }
                if let Err(e) = self
                    .queue
                    .retry_later(delivery, self.settings.retry_delay)
                    .await
                {
                    error!("[{id}] Could not schedule retry: {e}");
                }
            }
            FailureAction::GiveUp => {
                error!("[{id}] Evaluation failed after {attempts} attempts: {message}");
                if let Err(e) = repository::mark_failed(&self.db, id, message).await {
                    error!("[{id}] Could not mark evaluation failed: {e}");
                }
                if let Err(e) = self.queue.dead_letter(delivery, message).await {
                    error!("[{id}] Could not dead-letter job: {e}");
                }
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.queue.ack(delivery).await {
            error!(
                "[{}] Could not ack job: {e}",
                delivery.job.evaluation_id
            );
        }
    }
}

async fn run_promoter(queue: JobQueue, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(PROMOTE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => match queue.promote_due().await {
                Ok(0) => {}
                Ok(n) => info!("Promoted {n} delayed jobs"),
                Err(e) => warn!("Failed to promote delayed jobs: {e}"),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
