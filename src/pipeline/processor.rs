//! Report pipeline orchestrator.
//!
//! Single entry point that drives the extraction-to-score pipeline:
//! normalize → extract → reconcile → triage + validate, and later
//! complete → score. Pure and synchronous; persistence and the risk model
//! call belong to the API layer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::extraction::{normalize_report_text, overall_confidence, FieldExtractor};
use super::reconcile::{resolve, ResolvedField, ResolvedMap};
use super::record::{complete_features, CompletionResult, FeatureRecord};
use super::scoring::{
    Contributor, HealthScoreAggregator, PredictionResult, ScoringConfig,
};
use super::triage::{TriageConfig, TriageEngine, TriageOutcome};
use super::validation::{plausibility_warnings, validate};
use super::PipelineError;
use crate::schema::{FieldValue, SchemaRegistry, Task, TaskSchema};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Per-field extraction details returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMeta {
    pub value: FieldValue,
    pub unit: Option<String>,
    pub confidence: f64,
    /// Rule that produced the value.
    pub source: String,
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub task: Task,
    /// Values trusted enough to prefill the feature form.
    pub resolved_fields: BTreeMap<String, FieldValue>,
    /// Every resolved field, whatever its confidence.
    pub extracted_meta: BTreeMap<String, ExtractedMeta>,
    pub missing_fields: BTreeSet<String>,
    pub needs_confirmation_fields: BTreeSet<String>,
    pub out_of_range_fields: BTreeSet<String>,
    pub warnings: Vec<String>,
    pub overall_confidence: f64,
    pub candidate_count: usize,
    pub text_length: usize,
}

/// Outcome of one scoring call. Label and probability are absent for tasks
/// without a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringReport {
    pub task: Task,
    pub label: Option<u8>,
    pub probability: Option<f64>,
    pub health_score: Option<f64>,
    pub top_contributors: Vec<Contributor>,
    pub warnings: Vec<String>,
}

/// Rebuild resolved fields from stored extraction details.
pub fn resolved_from_meta(meta: &BTreeMap<String, ExtractedMeta>) -> ResolvedMap {
    meta.iter()
        .map(|(name, m)| {
            let field = ResolvedField {
                field_name: name.clone(),
                value: m.value.clone(),
                unit: m.unit.clone(),
                confidence: m.confidence,
                source_rule_id: m.source.clone(),
            };
            (name.clone(), field)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Holds the shared read-only parts of the pipeline: registry, compiled
/// extractor, triage thresholds and scoring parameters.
pub struct ReportPipeline {
    registry: Arc<SchemaRegistry>,
    extractor: FieldExtractor,
    triage: TriageEngine,
    aggregator: HealthScoreAggregator,
}

impl ReportPipeline {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        triage: TriageConfig,
        scoring: ScoringConfig,
    ) -> Result<Self, PipelineError> {
        let extractor = FieldExtractor::new(&registry)?;
        let triage = TriageEngine::new(triage)?;
        Ok(Self {
            registry,
            extractor,
            triage,
            aggregator: HealthScoreAggregator::new(scoring),
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn schema(&self, task: Task) -> &TaskSchema {
        self.registry.schema(task)
    }

    pub fn triage_config(&self) -> TriageConfig {
        self.triage.config()
    }

    /// Extract, reconcile, triage and validate one report.
    pub fn ingest(&self, raw_text: &str, task: Task) -> IngestionReport {
        let schema = self.registry.schema(task);
        let text = normalize_report_text(raw_text);

        let candidates = self.extractor.extract_normalized(&text, task);
        let resolved = resolve(&candidates);
        let outcome = self.triage.triage(&resolved, schema);
        let out_of_range = validate(&resolved, schema);

        let mut warnings = Vec::new();
        if candidates.is_empty() {
            warnings.push("No recognizable fields found in report text".to_string());
        }
        for field in resolved.values().filter(|r| r.confidence == 0.0) {
            warnings.push(format!(
                "{} value has unit {} that cannot be converted; value ignored",
                field.field_name,
                field.unit.as_deref().unwrap_or("unknown"),
            ));
        }
        warnings.extend(plausibility_warnings(&resolved, schema));

        let report = IngestionReport {
            task,
            resolved_fields: accepted_values(&resolved, &outcome),
            extracted_meta: resolved
                .iter()
                .map(|(name, r)| {
                    let meta = ExtractedMeta {
                        value: r.value.clone(),
                        unit: r.unit.clone(),
                        confidence: r.confidence,
                        source: r.source_rule_id.clone(),
                    };
                    (name.clone(), meta)
                })
                .collect(),
            missing_fields: outcome.missing.clone(),
            needs_confirmation_fields: outcome.needs_confirmation.clone(),
            out_of_range_fields: out_of_range,
            warnings,
            overall_confidence: overall_confidence(resolved.values().map(|r| r.confidence)),
            candidate_count: candidates.len(),
            text_length: text.len(),
        };

        tracing::info!(
            task = %task,
            text_length = report.text_length,
            candidate_count = report.candidate_count,
            resolved = report.extracted_meta.len(),
            missing = report.missing_fields.len(),
            needs_confirmation = report.needs_confirmation_fields.len(),
            out_of_range = report.out_of_range_fields.len(),
            "Report ingested"
        );

        report
    }

    /// Merge trusted extracted values with user inputs.
    /// Extracted values below the confirmation threshold are not carried over.
    pub fn complete(
        &self,
        task: Task,
        extracted: &ResolvedMap,
        user_inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<CompletionResult, PipelineError> {
        let schema = self.registry.schema(task);
        let outcome = self.triage.triage(extracted, schema);
        let trusted: ResolvedMap = extracted
            .iter()
            .filter(|(name, _)| {
                outcome.auto_accepted.contains(*name) || outcome.needs_confirmation.contains(*name)
            })
            .map(|(name, r)| (name.clone(), r.clone()))
            .collect();

        let result = complete_features(schema, &trusted, user_inputs)?;
        tracing::debug!(
            task = %task,
            user_inputs = user_inputs.len(),
            still_missing = result.still_missing.len(),
            "Features completed"
        );
        Ok(result)
    }

    /// Aggregate a health score for confirmed features.
    pub fn score(
        &self,
        prediction: Option<&PredictionResult>,
        features: &FeatureRecord,
    ) -> Result<ScoringReport, PipelineError> {
        let schema = self.registry.schema(features.task());
        let resolved = features.to_resolved(schema);
        let result = self.aggregator.score(prediction, &resolved, schema)?;

        let mut warnings = plausibility_warnings(&resolved, schema);
        let out_of_range = validate(&resolved, schema);
        if !out_of_range.is_empty() {
            warnings.push(format!(
                "Outside reference range: {}",
                out_of_range.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        let with_model = schema.requires_model;
        Ok(ScoringReport {
            task: schema.task,
            label: prediction.filter(|_| with_model).map(|p| p.label),
            probability: prediction.filter(|_| with_model).map(|p| p.probability),
            health_score: result.as_ref().map(|r| r.score),
            top_contributors: result.map(|r| r.contributors).unwrap_or_default(),
            warnings,
        })
    }
}

/// Values of fields that are auto-accepted or awaiting confirmation.
fn accepted_values(resolved: &ResolvedMap, outcome: &TriageOutcome) -> BTreeMap<String, FieldValue> {
    resolved
        .iter()
        .filter(|(name, _)| {
            outcome.auto_accepted.contains(*name) || outcome.needs_confirmation.contains(*name)
        })
        .map(|(name, r)| (name.clone(), r.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scoring::ScoringError;
    use crate::pipeline::triage::TriageError;
    use crate::schema::DataType;
    use serde_json::json;

    fn pipeline() -> ReportPipeline {
        ReportPipeline::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            TriageConfig::default(),
            ScoringConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn cholesterol_report_without_age() {
        let report = pipeline().ingest("Cholesterol: 260 mg/dL", Task::Heart);

        let chol = &report.extracted_meta["chol"];
        assert_eq!(chol.value, FieldValue::Numeric(260.0));
        assert_eq!(chol.confidence, 0.97);
        assert_eq!(chol.source, "exact_label:chol:0");

        assert!(!report.missing_fields.contains("chol"));
        assert!(!report.needs_confirmation_fields.contains("chol"));
        assert_eq!(report.resolved_fields["chol"], FieldValue::Numeric(260.0));
        assert!(report.out_of_range_fields.contains("chol"));
        assert!(report.missing_fields.contains("age"));
    }

    #[test]
    fn table_value_needs_confirmation() {
        let text = "Vitals\nResting blood pressure\t130\tmmHg\nbp was 128 on arrival";
        let report = pipeline().ingest(text, Task::Heart);

        assert_eq!(report.extracted_meta["trestbps"].value, FieldValue::Numeric(130.0));
        assert_eq!(report.extracted_meta["trestbps"].confidence, 0.93);
        assert!(report.needs_confirmation_fields.contains("trestbps"));
        assert!(!report.missing_fields.contains("trestbps"));
    }

    #[test]
    fn misordered_thresholds_fail_construction() {
        let result = ReportPipeline::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            TriageConfig { high: 0.5, medium: 0.9 },
            ScoringConfig::default(),
        );
        assert!(matches!(
            result,
            Err(PipelineError::Triage(TriageError::InvalidThreshold { .. }))
        ));
    }

    #[test]
    fn score_with_prediction() {
        let p = pipeline();
        let schema = p.schema(Task::Heart);
        let features =
            FeatureRecord::from_inputs(schema, &serde_json::from_value(json!({"chol": 215})).unwrap())
                .unwrap();
        let prediction = PredictionResult {
            label: 1,
            probability: 0.8,
        };
        let report = p.score(Some(&prediction), &features).unwrap();
        assert_eq!(report.health_score, Some(18.0));
        assert_eq!(report.top_contributors.len(), 1);
        assert_eq!(report.top_contributors[0].field_name, "chol");
        assert_eq!(report.top_contributors[0].deviation_weight, 2.0);
        assert_eq!(report.label, Some(1));
    }

    #[test]
    fn score_without_prediction_fails_for_model_task() {
        let p = pipeline();
        let features = FeatureRecord::empty(Task::Diabetes);
        let result = p.score(None, &features);
        assert!(matches!(
            result,
            Err(PipelineError::Scoring(ScoringError::MissingPrediction(Task::Diabetes)))
        ));
    }

    #[test]
    fn general_task_returns_all_values_and_no_score() {
        let p = pipeline();
        let text = "Glucose: 92 mg/dL\nHbA1c: 5,4 %\nTSH 2.1 mIU/L";
        let report = p.ingest(text, Task::General);
        assert!(report.missing_fields.is_empty());
        assert_eq!(report.extracted_meta.len(), 3);
        assert!(report.extracted_meta.contains_key("tsh"));

        let features = FeatureRecord::from_resolved(
            p.schema(Task::General),
            &resolved_from_meta(&report.extracted_meta),
        )
        .unwrap();
        let scored = p.score(None, &features).unwrap();
        assert_eq!(scored.health_score, None);
        assert_eq!(scored.label, None);
        assert!(scored.top_contributors.is_empty());
    }

    #[test]
    fn empty_text_warns_and_reports_required_missing() {
        let report = pipeline().ingest("   \n\x00", Task::Diabetes);
        assert_eq!(report.candidate_count, 0);
        assert_eq!(report.text_length, 0);
        assert_eq!(report.overall_confidence, 0.0);
        assert!(!report.warnings.is_empty());
        let required: BTreeSet<String> = pipeline()
            .schema(Task::Diabetes)
            .required_fields()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(report.missing_fields, required);
    }

    #[test]
    fn unconvertible_unit_is_missing_with_warning() {
        let report = pipeline().ingest("Age: 54 mmol/L", Task::Heart);
        assert_eq!(report.extracted_meta["age"].confidence, 0.0);
        assert!(report.missing_fields.contains("age"));
        assert!(report.warnings.iter().any(|w| w.contains("age")));
    }

    #[test]
    fn completion_drops_low_confidence_extractions() {
        let p = pipeline();
        let report = p.ingest("chol maybe 240 per phone call", Task::Heart);
        let extracted = resolved_from_meta(&report.extracted_meta);
        assert_eq!(extracted["chol"].confidence, 0.80);

        let result = p.complete(Task::Heart, &extracted, &BTreeMap::new()).unwrap();
        assert!(result.still_missing.contains(&"chol".to_string()));

        let inputs = serde_json::from_value(json!({"chol": 240})).unwrap();
        let result = p.complete(Task::Heart, &extracted, &inputs).unwrap();
        assert!(!result.still_missing.contains(&"chol".to_string()));
        assert_eq!(result.notes.len(), 1);
    }

    #[test]
    fn resolved_confidences_in_unit_interval_and_high_is_auto_accepted() {
        let p = pipeline();
        let text = "Age: 61\nSex: male\nChest pain: asymptomatic\nBP 145/90\nCholesterol\t5,9\tmmol/L\nMax heart rate: 132 bpm";
        let report = p.ingest(text, Task::Heart);
        for (name, meta) in &report.extracted_meta {
            assert!((0.0..=1.0).contains(&meta.confidence), "{name}");
            if meta.confidence >= 0.95 {
                assert!(!report.needs_confirmation_fields.contains(name));
                assert!(!report.missing_fields.contains(name));
            }
        }
        let schema = p.schema(Task::Heart);
        assert_eq!(schema.get("sex").unwrap().data_type, DataType::Categorical);
        assert_eq!(report.extracted_meta["sex"].value, FieldValue::Categorical("1".into()));
    }
}
