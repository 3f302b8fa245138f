//! Structured model outputs and the persisted evaluation result.
//!
//! Model output is loosely typed in practice (nulls, numbers as strings,
//! years as integers), so every field deserializes leniently and defaults
//! when missing.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => vec![],
    })
}

fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(&Value::deserialize(deserializer)?))
}

fn lenient_years<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(&Value::deserialize(deserializer)?)
        .filter(|y| y.is_finite() && *y >= 0.0)
        .map(|y| y.round() as u32))
}

fn lenient_scores<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| lenient_number(&v).map(|n| (k, n)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => vec![],
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub degree: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub institution: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub technologies: Vec<String>,
}

/// Step 1 output: structured view of the CV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvExtraction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub fullname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_job: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient_years")]
    pub experience_years: Option<u32>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub education: Vec<EducationEntry>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub certifications: Vec<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub projects: Vec<ProjectEntry>,
}

impl CvExtraction {
    /// Minimal extraction used when the model output cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            summary: "Failed to extract CV information".to_string(),
            category_job: "Unknown".to_string(),
            ..Default::default()
        }
    }
}

/// Steps 2 & 3 output: CV against job requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvMatch {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub match_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub feedback: String,
    #[serde(default, deserialize_with = "lenient_scores")]
    pub skill_breakdown: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub strong_points: Vec<String>,
}

/// Step 4 output: project report against the rubric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEvaluation {
    #[serde(default, deserialize_with = "lenient_scores")]
    pub parameter_scores: BTreeMap<String, f64>,
    /// The model's own arithmetic; informational only.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weighted_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub feedback: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
}

/// What a completed evaluation stores in `evaluations.result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub cv_match_rate: f64,
    pub cv_feedback: String,
    pub project_score: f64,
    pub project_feedback: String,
    pub overall_summary: String,
    pub cv_extraction: CvExtraction,
    pub detailed_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub strong_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}
