use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an evaluation: `queued → processing → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStatus::Queued => "queued",
            EvaluationStatus::Processing => "processing",
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }

    /// Statuses never move backwards and terminal states never change.
    /// `processing → processing` is a retried attempt.
    pub fn can_transition_to(self, next: EvaluationStatus) -> bool {
        use EvaluationStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Queued, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Statuses a row may currently hold for an update to `self` to apply.
    /// Used to build the `WHERE status IN (...)` guard of each transition.
    pub fn allowed_predecessors(self) -> Vec<&'static str> {
        [
            EvaluationStatus::Queued,
            EvaluationStatus::Processing,
            EvaluationStatus::Completed,
            EvaluationStatus::Failed,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(self))
        .map(EvaluationStatus::as_str)
        .collect()
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(EvaluationStatus::Queued),
            "processing" => Ok(EvaluationStatus::Processing),
            "completed" => Ok(EvaluationStatus::Completed),
            "failed" => Ok(EvaluationStatus::Failed),
            other => Err(format!("unknown evaluation status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub status: String,
    pub cv_content: String,
    pub project_content: String,
    pub job_description: String,
    pub job_template_id: Option<Uuid>,
    pub cv_extraction: Option<Value>,
    pub result: Option<Value>,
    pub processing_time: Option<f64>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationRow {
    /// The CHECK constraint on `evaluations.status` keeps this total;
    /// anything unexpected is reported as failed rather than panicking.
    pub fn status(&self) -> EvaluationStatus {
        self.status.parse().unwrap_or(EvaluationStatus::Failed)
    }
}
