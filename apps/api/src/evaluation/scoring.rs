use std::collections::BTreeMap;

use crate::evaluation::models::{CvMatch, ProjectEvaluation};

/// CV match criteria and their weights (sum to 1.0).
pub const CV_MATCH_WEIGHTS: [(&str, f64); 4] = [
    ("technical_skills", 0.40),
    ("experience_level", 0.30),
    ("achievements", 0.20),
    ("cultural_fit", 0.10),
];

/// Project rubric parameters and their weights (sum to 1.0).
pub const PROJECT_WEIGHTS: [(&str, f64); 5] = [
    ("correctness", 0.25),
    ("code_quality", 0.25),
    ("resilience", 0.25),
    ("documentation", 0.15),
    ("creativity", 0.10),
];

pub const PROJECT_SCORE_MAX: f64 = 10.0;

fn weighted_sum(scores: &BTreeMap<String, f64>, weights: &[(&str, f64)]) -> f64 {
    weights
        .iter()
        .map(|(name, weight)| scores.get(*name).copied().unwrap_or(0.0) * weight)
        .sum()
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn clamp_scores(scores: &BTreeMap<String, f64>, max: f64) -> BTreeMap<String, f64> {
    scores
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k.clone(), v.clamp(0.0, max)))
        .collect()
}

/// Normalizes the model's CV match: breakdown values clamped to `[0, 1]`,
/// and a missing `match_rate` derived from the weighted breakdown.
pub fn normalize_cv_match(mut cv_match: CvMatch) -> CvMatch {
    cv_match.skill_breakdown = clamp_scores(&cv_match.skill_breakdown, 1.0);
    let rate = match cv_match.match_rate.filter(|r| r.is_finite()) {
        Some(rate) => rate,
        None => weighted_sum(&cv_match.skill_breakdown, &CV_MATCH_WEIGHTS),
    };
    cv_match.match_rate = Some(rate.clamp(0.0, 1.0));
    cv_match
}

/// Clamps each rubric score to `[0, 10]`.
pub fn normalize_project(mut project: ProjectEvaluation) -> ProjectEvaluation {
    project.parameter_scores = clamp_scores(&project.parameter_scores, PROJECT_SCORE_MAX);
    project
}

/// Final project score: fixed-weight average of the rubric parameters,
/// rounded to one decimal. Missing parameters count as zero.
pub fn project_score(project: &ProjectEvaluation) -> f64 {
    round1(weighted_sum(&project.parameter_scores, &PROJECT_WEIGHTS))
}

/// Union of the CV breakdown and the project parameter scores.
/// Project scores win on a name collision.
pub fn detailed_scores(
    cv_match: &CvMatch,
    project: &ProjectEvaluation,
) -> BTreeMap<String, f64> {
    cv_match
        .skill_breakdown
        .iter()
        .chain(project.parameter_scores.iter())
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let cv: f64 = CV_MATCH_WEIGHTS.iter().map(|(_, w)| w).sum();
        let project: f64 = PROJECT_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((cv - 1.0).abs() < 1e-9);
        assert!((project - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_score_weighted_average() {
        // 0.25*8 + 0.25*7.5 + 0.25*6 + 0.15*9 + 0.10*7 = 7.425 -> 7.4
        let project = ProjectEvaluation {
            parameter_scores: scores(&[
                ("correctness", 8.0),
                ("code_quality", 7.5),
                ("resilience", 6.0),
                ("documentation", 9.0),
                ("creativity", 7.0),
            ]),
            weighted_score: Some(9.9),
            ..Default::default()
        };
        assert_eq!(project_score(&project), 7.4);
    }

    #[test]
    fn test_project_score_missing_parameters_count_zero() {
        let project = ProjectEvaluation {
            parameter_scores: scores(&[("correctness", 10.0)]),
            ..Default::default()
        };
        assert_eq!(project_score(&project), 2.5);
        assert_eq!(project_score(&ProjectEvaluation::default()), 0.0);
    }

    #[test]
    fn test_normalize_project_clamps_out_of_range() {
        let project = normalize_project(ProjectEvaluation {
            parameter_scores: scores(&[("correctness", 14.0), ("creativity", -3.0)]),
            ..Default::default()
        });
        assert_eq!(project.parameter_scores["correctness"], 10.0);
        assert_eq!(project.parameter_scores["creativity"], 0.0);
    }

    #[test]
    fn test_match_rate_clamped() {
        let m = normalize_cv_match(CvMatch {
            match_rate: Some(1.7),
            ..Default::default()
        });
        assert_eq!(m.match_rate, Some(1.0));
    }

    #[test]
    fn test_missing_match_rate_derived_from_breakdown() {
        // 0.4*1.0 + 0.3*0.5 + 0.2*0.5 + 0.1*0.0 = 0.65
        let m = normalize_cv_match(CvMatch {
            match_rate: None,
            skill_breakdown: scores(&[
                ("technical_skills", 1.0),
                ("experience_level", 0.5),
                ("achievements", 0.5),
                ("cultural_fit", 0.0),
            ]),
            ..Default::default()
        });
        assert!((m.match_rate.unwrap() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_detailed_scores_merge() {
        let cv = CvMatch {
            skill_breakdown: scores(&[("technical_skills", 0.8), ("shared", 0.1)]),
            ..Default::default()
        };
        let project = ProjectEvaluation {
            parameter_scores: scores(&[("correctness", 8.0), ("shared", 9.0)]),
            ..Default::default()
        };
        let merged = detailed_scores(&cv, &project);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["technical_skills"], 0.8);
        assert_eq!(merged["shared"], 9.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(7.45), 7.5);
        assert_eq!(round1(7.44), 7.4);
    }
}
