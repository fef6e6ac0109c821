//! Schema-checked feature records and completion of partially extracted
//! reports with user-supplied values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extraction::rule_confidence;
use super::extraction::rules::USER_INPUT_RULE_ID;
use super::reconcile::{ResolvedField, ResolvedMap};
use crate::schema::{DataType, FieldValue, Task, TaskSchema};

/// Added to completion results whenever the user supplied values.
pub const USER_OVERRIDE_NOTE: &str = "User values override extracted values";

#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("Unknown field '{field}' for task {task}")]
    UnknownField { task: Task, field: String },

    #[error("Value {value} does not fit field '{field}' ({expected})")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },
}

/// Feature values keyed by field name. Every key is a field of `task`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    task: Task,
    values: BTreeMap<String, FieldValue>,
}

impl FeatureRecord {
    pub fn empty(task: Task) -> Self {
        Self {
            task,
            values: BTreeMap::new(),
        }
    }

    /// Build from resolved fields, rejecting names the schema does not know.
    pub fn from_resolved(schema: &TaskSchema, resolved: &ResolvedMap) -> Result<Self, RecordError> {
        let mut record = Self::empty(schema.task);
        for (name, field) in resolved {
            record.insert(schema, name, field.value.clone())?;
        }
        Ok(record)
    }

    /// Build from loosely typed JSON input. `null` values are skipped.
    pub fn from_inputs(
        schema: &TaskSchema,
        inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, RecordError> {
        let mut record = Self::empty(schema.task);
        for (name, raw) in inputs {
            if let Some(value) = coerce_input(schema, name, raw)? {
                record.insert(schema, name, value)?;
            }
        }
        Ok(record)
    }

    /// Insert a value, checking name and data type against the schema.
    pub fn insert(
        &mut self,
        schema: &TaskSchema,
        name: &str,
        value: FieldValue,
    ) -> Result<(), RecordError> {
        let field = schema.get(name).ok_or_else(|| RecordError::UnknownField {
            task: schema.task,
            field: name.to_string(),
        })?;
        if value.data_type() != field.data_type {
            return Err(RecordError::TypeMismatch {
                field: name.to_string(),
                expected: field.data_type.as_str(),
                value: value.to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Required schema fields without a value, in schema order.
    pub fn missing_required(&self, schema: &TaskSchema) -> Vec<String> {
        schema
            .required_fields()
            .filter(|f| !self.values.contains_key(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// View as resolved fields, as if every value had been confirmed by the user.
    pub fn to_resolved(&self, schema: &TaskSchema) -> ResolvedMap {
        self.values
            .iter()
            .map(|(name, value)| {
                let field = ResolvedField {
                    field_name: name.clone(),
                    value: value.clone(),
                    unit: schema.get(name).and_then(|f| f.unit.clone()),
                    confidence: rule_confidence::USER_INPUT,
                    source_rule_id: USER_INPUT_RULE_ID.to_string(),
                };
                (name.clone(), field)
            })
            .collect()
    }
}

/// Where a completed value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    Extracted,
    User,
}

/// One schema field in a completion result; `value` is null when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureEntry {
    pub field_name: String,
    pub value: Option<FieldValue>,
    pub source: Option<FeatureSource>,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResult {
    pub task: Task,
    /// Every schema field, in schema order.
    pub features_ready: Vec<FeatureEntry>,
    pub still_missing: Vec<String>,
    pub notes: Vec<String>,
    #[serde(skip)]
    pub record: FeatureRecord,
}

impl CompletionResult {
    pub fn is_complete(&self) -> bool {
        self.still_missing.is_empty()
    }
}

/// Merge extracted values with user inputs. User values win.
pub fn complete_features(
    schema: &TaskSchema,
    extracted: &ResolvedMap,
    user_inputs: &BTreeMap<String, serde_json::Value>,
) -> Result<CompletionResult, RecordError> {
    let mut record = FeatureRecord::from_resolved(schema, extracted)?;
    let mut sources: BTreeMap<String, FeatureSource> = record
        .values
        .keys()
        .map(|k| (k.clone(), FeatureSource::Extracted))
        .collect();

    for (name, raw) in user_inputs {
        if let Some(value) = coerce_input(schema, name, raw)? {
            record.insert(schema, name, value)?;
            sources.insert(name.clone(), FeatureSource::User);
        }
    }

    let features_ready = schema
        .fields()
        .map(|f| FeatureEntry {
            field_name: f.name.clone(),
            value: record.get(&f.name).cloned(),
            source: sources.get(&f.name).copied(),
            required: f.required,
        })
        .collect();

    let mut notes = Vec::new();
    if !user_inputs.is_empty() {
        notes.push(USER_OVERRIDE_NOTE.to_string());
    }

    Ok(CompletionResult {
        task: schema.task,
        features_ready,
        still_missing: record.missing_required(schema),
        notes,
        record,
    })
}

fn coerce_input(
    schema: &TaskSchema,
    name: &str,
    raw: &serde_json::Value,
) -> Result<Option<FieldValue>, RecordError> {
    let field = schema.get(name).ok_or_else(|| RecordError::UnknownField {
        task: schema.task,
        field: name.to_string(),
    })?;
    field.coerce_json(raw).ok_or_else(|| RecordError::TypeMismatch {
        field: name.to_string(),
        expected: expected_label(field.data_type),
        value: raw.to_string(),
    })
}

fn expected_label(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Numeric => "a number",
        DataType::Categorical => "one of the field's categories",
        DataType::Boolean => "true or false",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn heart() -> TaskSchema {
        SchemaRegistry::builtin().unwrap().schema(Task::Heart).clone()
    }

    fn extracted(entries: &[(&str, FieldValue)]) -> ResolvedMap {
        entries
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    ResolvedField {
                        field_name: name.to_string(),
                        value: value.clone(),
                        unit: None,
                        confidence: 0.97,
                        source_rule_id: format!("exact_label:{name}:0"),
                    },
                )
            })
            .collect()
    }

    fn inputs(value: serde_json::Value) -> BTreeMap<String, serde_json::Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn unknown_resolved_field_rejected() {
        let result = FeatureRecord::from_resolved(
            &heart(),
            &extracted(&[("glucose", FieldValue::Numeric(98.0))]),
        );
        assert!(matches!(result, Err(RecordError::UnknownField { field, .. }) if field == "glucose"));
    }

    #[test]
    fn wrong_data_type_rejected() {
        let result =
            FeatureRecord::from_resolved(&heart(), &extracted(&[("chol", FieldValue::Boolean(true))]));
        assert!(matches!(result, Err(RecordError::TypeMismatch { .. })));
    }

    #[test]
    fn user_values_override_extracted() {
        let schema = heart();
        let result = complete_features(
            &schema,
            &extracted(&[("chol", FieldValue::Numeric(260.0)), ("age", FieldValue::Numeric(54.0))]),
            &inputs(json!({"chol": 240, "sex": "male"})),
        )
        .unwrap();

        assert_eq!(result.record.get("chol"), Some(&FieldValue::Numeric(240.0)));
        assert_eq!(result.record.get("sex"), Some(&FieldValue::Categorical("1".into())));
        assert_eq!(result.notes, vec![USER_OVERRIDE_NOTE.to_string()]);

        let chol = result.features_ready.iter().find(|e| e.field_name == "chol").unwrap();
        assert_eq!(chol.source, Some(FeatureSource::User));
        let age = result.features_ready.iter().find(|e| e.field_name == "age").unwrap();
        assert_eq!(age.source, Some(FeatureSource::Extracted));
    }

    #[test]
    fn features_ready_in_schema_order_with_nulls() {
        let schema = heart();
        let result = complete_features(&schema, &ResolvedMap::new(), &BTreeMap::new()).unwrap();
        let names: Vec<&str> = result.features_ready.iter().map(|e| e.field_name.as_str()).collect();
        let expected: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, expected);
        assert!(result.features_ready.iter().all(|e| e.value.is_none()));
        assert!(result.notes.is_empty());
    }

    #[test]
    fn still_missing_lists_required_without_value() {
        let schema = heart();
        let result = complete_features(
            &schema,
            &extracted(&[("chol", FieldValue::Numeric(260.0))]),
            &inputs(json!({"age": [54], "trestbps": null})),
        )
        .unwrap();
        assert_eq!(result.still_missing, vec!["sex", "cp", "trestbps", "thalach"]);
        assert!(!result.is_complete());
    }

    #[test]
    fn unknown_user_field_rejected() {
        let result = complete_features(&heart(), &ResolvedMap::new(), &inputs(json!({"glucose": 98})));
        assert!(matches!(result, Err(RecordError::UnknownField { .. })));
    }

    #[test]
    fn uncoercible_user_value_rejected() {
        let result = complete_features(&heart(), &ResolvedMap::new(), &inputs(json!({"chol": "high"})));
        assert!(matches!(result, Err(RecordError::TypeMismatch { field, .. }) if field == "chol"));
    }

    #[test]
    fn to_resolved_marks_user_confidence() {
        let schema = heart();
        let record = FeatureRecord::from_inputs(&schema, &inputs(json!({"chol": 210}))).unwrap();
        let resolved = record.to_resolved(&schema);
        assert_eq!(resolved["chol"].confidence, 1.0);
        assert_eq!(resolved["chol"].source_rule_id, "user_input");
        assert_eq!(resolved["chol"].unit.as_deref(), Some("mg/dL"));
    }
}
