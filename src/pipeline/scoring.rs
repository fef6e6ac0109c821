//! Health score aggregation.
//!
//! The base score comes from the risk model's probability of the adverse
//! class; out-of-range features subtract capped penalties from it. The
//! features with the largest penalties are reported as contributors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reconcile::ResolvedMap;
use crate::schema::{Task, TaskSchema, ValueRange};

/// Upper clamp for the normalized deviation.
const MAX_DEVIATION: f64 = 2.0;

#[derive(Error, Debug, PartialEq)]
pub enum ScoringError {
    #[error("Task {0} requires a model prediction before scoring")]
    MissingPrediction(Task),

    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),
}

/// Risk model output. `probability` is the probability of class 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: u8,
    pub probability: f64,
}

impl PredictionResult {
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.label > 1 {
            return Err(ScoringError::InvalidPrediction(format!(
                "label must be 0 or 1, got {}",
                self.label
            )));
        }
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(ScoringError::InvalidPrediction(format!(
                "probability must be within [0, 1], got {}",
                self.probability
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Most points a single field can subtract.
    pub per_field_max_penalty: f64,
    /// Length cap of the contributor list.
    pub max_contributors: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            per_field_max_penalty: 5.0,
            max_contributors: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub field_name: String,
    pub deviation_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreResult {
    pub score: f64,
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScoreAggregator {
    config: ScoringConfig,
}

impl HealthScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ScoringConfig {
        self.config
    }

    /// Score a set of resolved features.
    ///
    /// Returns `Ok(None)` for tasks without a model. Tasks with a model fail
    /// with [`ScoringError::MissingPrediction`] when `prediction` is absent.
    pub fn score(
        &self,
        prediction: Option<&PredictionResult>,
        resolved: &ResolvedMap,
        schema: &TaskSchema,
    ) -> Result<Option<HealthScoreResult>, ScoringError> {
        if !schema.requires_model {
            return Ok(None);
        }
        let prediction = prediction.ok_or(ScoringError::MissingPrediction(schema.task))?;
        prediction.validate()?;

        let p_adverse = if schema.adverse_class_label == 1 {
            prediction.probability
        } else {
            1.0 - prediction.probability
        };
        let base = 100.0 * (1.0 - p_adverse);

        let mut penalties: Vec<(&str, f64)> = schema
            .fields()
            .filter_map(|field| {
                let range = field.reference_range?;
                let value = resolved.get(&field.name)?.value.as_f64()?;
                let penalty = field_penalty(
                    normalized_deviation(value, &range),
                    self.config.per_field_max_penalty,
                );
                (penalty > 0.0).then_some((field.name.as_str(), penalty))
            })
            .collect();

        let total_penalty: f64 = penalties.iter().map(|(_, p)| p).sum();
        let score = round2((base - total_penalty).clamp(0.0, 100.0));

        penalties.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let contributors = penalties
            .into_iter()
            .take(self.config.max_contributors)
            .map(|(name, penalty)| Contributor {
                field_name: name.to_string(),
                deviation_weight: round2(penalty),
            })
            .collect();

        tracing::debug!(
            task = %schema.task,
            probability = prediction.probability,
            score,
            "Health score computed"
        );

        Ok(Some(HealthScoreResult {
            score,
            contributors,
        }))
    }
}

/// `|value - midpoint| / halfwidth`, clamped to `[0, 2]`.
/// A zero-width range gives 0 on the point and 2 anywhere else.
pub fn normalized_deviation(value: f64, range: &ValueRange) -> f64 {
    let half = range.halfwidth();
    if half <= 0.0 {
        return if value == range.midpoint() { 0.0 } else { MAX_DEVIATION };
    }
    ((value - range.midpoint()).abs() / half).clamp(0.0, MAX_DEVIATION)
}

/// Penalty for a normalized deviation; zero inside the range.
pub fn field_penalty(deviation: f64, per_field_max: f64) -> f64 {
    if deviation <= 1.0 {
        return 0.0;
    }
    ((deviation - 1.0) * per_field_max).min(per_field_max)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reconcile::ResolvedField;
    use crate::schema::{FieldValue, SchemaRegistry};

    fn resolved(entries: &[(&str, f64)]) -> ResolvedMap {
        entries
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    ResolvedField {
                        field_name: name.to_string(),
                        value: FieldValue::Numeric(*value),
                        unit: None,
                        confidence: 0.97,
                        source_rule_id: "exact_label:x:0".into(),
                    },
                )
            })
            .collect()
    }

    fn heart() -> TaskSchema {
        SchemaRegistry::builtin().unwrap().schema(Task::Heart).clone()
    }

    #[test]
    fn adverse_probability_with_one_penalty() {
        // chol range 125-200: midpoint 162.5, halfwidth 37.5; 215 gives d = 1.4
        let prediction = PredictionResult {
            label: 1,
            probability: 0.8,
        };
        let result = HealthScoreAggregator::default()
            .score(Some(&prediction), &resolved(&[("chol", 215.0)]), &heart())
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 18.0);
        assert_eq!(
            result.contributors,
            vec![Contributor {
                field_name: "chol".into(),
                deviation_weight: 2.0
            }]
        );
    }

    #[test]
    fn missing_prediction_for_model_task() {
        let result = HealthScoreAggregator::default().score(None, &resolved(&[]), &heart());
        assert_eq!(result, Err(ScoringError::MissingPrediction(Task::Heart)));
    }

    #[test]
    fn no_model_task_has_no_score() {
        let registry = SchemaRegistry::builtin().unwrap();
        let general = registry.schema(Task::General);
        let prediction = PredictionResult {
            label: 0,
            probability: 0.1,
        };
        let aggregator = HealthScoreAggregator::default();
        assert_eq!(aggregator.score(None, &resolved(&[]), general), Ok(None));
        assert_eq!(aggregator.score(Some(&prediction), &resolved(&[]), general), Ok(None));
    }

    #[test]
    fn invalid_prediction_rejected() {
        let aggregator = HealthScoreAggregator::default();
        for prediction in [
            PredictionResult { label: 1, probability: 1.5 },
            PredictionResult { label: 1, probability: f64::NAN },
            PredictionResult { label: 3, probability: 0.5 },
        ] {
            let result = aggregator.score(Some(&prediction), &resolved(&[]), &heart());
            assert!(matches!(result, Err(ScoringError::InvalidPrediction(_))));
        }
    }

    #[test]
    fn adverse_label_zero_inverts_probability() {
        let mut schema = heart();
        schema.adverse_class_label = 0;
        let prediction = PredictionResult {
            label: 1,
            probability: 0.8,
        };
        let result = HealthScoreAggregator::default()
            .score(Some(&prediction), &resolved(&[]), &schema)
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 80.0);
    }

    #[test]
    fn score_non_increasing_in_adverse_probability() {
        let aggregator = HealthScoreAggregator::default();
        let features = resolved(&[("chol", 240.0), ("trestbps", 150.0), ("age", 54.0)]);
        let schema = heart();
        let mut previous = f64::INFINITY;
        for step in 0..=20 {
            let prediction = PredictionResult {
                label: 1,
                probability: step as f64 / 20.0,
            };
            let score = aggregator
                .score(Some(&prediction), &features, &schema)
                .unwrap()
                .unwrap()
                .score;
            assert!((0.0..=100.0).contains(&score));
            assert!(score <= previous, "score rose at step {step}");
            previous = score;
        }
    }

    #[test]
    fn penalty_capped_per_field() {
        let prediction = PredictionResult {
            label: 1,
            probability: 0.0,
        };
        let result = HealthScoreAggregator::default()
            .score(Some(&prediction), &resolved(&[("chol", 900.0)]), &heart())
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 95.0);
        assert_eq!(result.contributors[0].deviation_weight, 5.0);
    }

    #[test]
    fn contributors_sorted_and_capped() {
        let aggregator = HealthScoreAggregator::new(ScoringConfig {
            per_field_max_penalty: 5.0,
            max_contributors: 2,
        });
        let prediction = PredictionResult {
            label: 1,
            probability: 0.5,
        };
        // chol and thalach both saturate; trestbps smaller.
        let features = resolved(&[("chol", 900.0), ("thalach", 400.0), ("trestbps", 125.0)]);
        let result = aggregator
            .score(Some(&prediction), &features, &heart())
            .unwrap()
            .unwrap();
        let names: Vec<&str> = result.contributors.iter().map(|c| c.field_name.as_str()).collect();
        assert_eq!(names, vec!["chol", "thalach"]);
    }

    #[test]
    fn inside_range_contributes_nothing() {
        let prediction = PredictionResult {
            label: 1,
            probability: 0.3,
        };
        let result = HealthScoreAggregator::default()
            .score(Some(&prediction), &resolved(&[("chol", 200.0), ("age", 54.0)]), &heart())
            .unwrap()
            .unwrap();
        assert_eq!(result.score, 70.0);
        assert!(result.contributors.is_empty());
    }

    #[test]
    fn deviation_edge_cases() {
        let point = ValueRange::new(5.0, 5.0);
        assert_eq!(normalized_deviation(5.0, &point), 0.0);
        assert_eq!(normalized_deviation(5.1, &point), 2.0);
        let range = ValueRange::new(0.0, 10.0);
        assert_eq!(normalized_deviation(5.0, &range), 0.0);
        assert_eq!(normalized_deviation(10.0, &range), 1.0);
        assert_eq!(normalized_deviation(100.0, &range), 2.0);
        assert_eq!(field_penalty(1.0, 5.0), 0.0);
        assert_eq!(field_penalty(2.0, 5.0), 5.0);
    }

    #[test]
    fn identical_inputs_identical_output() {
        let aggregator = HealthScoreAggregator::default();
        let prediction = PredictionResult {
            label: 1,
            probability: 0.42,
        };
        let features = resolved(&[("chol", 260.0), ("thalach", 80.0)]);
        let a = aggregator.score(Some(&prediction), &features, &heart());
        let b = aggregator.score(Some(&prediction), &features, &heart());
        assert_eq!(a, b);
    }
}
