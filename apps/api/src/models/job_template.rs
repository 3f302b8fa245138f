use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobTemplateRow {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub requirements: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl JobTemplateRow {
    /// Job context handed to the pipeline when an evaluation references this template.
    pub fn job_description(&self) -> String {
        format!(
            "{}\n\nRequirements:\n{}",
            self.description.trim(),
            self.requirements.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_description_joins_description_and_requirements() {
        let template = JobTemplateRow {
            id: Uuid::new_v4(),
            title: "Backend Developer".into(),
            category: "Backend".into(),
            description: "Build APIs.\n".into(),
            requirements: "\n- Rust\n- PostgreSQL\n".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        assert_eq!(
            template.job_description(),
            "Build APIs.\n\nRequirements:\n- Rust\n- PostgreSQL"
        );
    }
}
