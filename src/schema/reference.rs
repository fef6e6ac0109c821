use std::path::Path;

use serde::Deserialize;

use super::types::{FieldDefinition, Task};
use super::SchemaError;

/// Top-level layout of a schema override file.
#[derive(Debug, Deserialize)]
struct OverrideFile {
    tasks: Vec<TaskOverride>,
}

/// Replacement field table for one task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskOverride {
    pub task: Task,
    #[serde(default)]
    pub adverse_class_label: Option<u8>,
    pub fields: Vec<FieldDefinition>,
}

/// Load task overrides from a JSON file.
pub fn load_overrides(path: &Path) -> Result<Vec<TaskOverride>, SchemaError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        SchemaError::ReferenceDataLoad(path.display().to_string(), e.to_string())
    })?;
    parse_overrides(&json, &path.display().to_string())
}

fn parse_overrides(json: &str, source: &str) -> Result<Vec<TaskOverride>, SchemaError> {
    let file: OverrideFile = serde_json::from_str(json)
        .map_err(|e| SchemaError::ReferenceDataParse(source.to_string(), e.to_string()))?;
    Ok(file.tasks)
}
