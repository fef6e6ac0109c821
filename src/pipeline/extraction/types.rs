use serde::{Deserialize, Serialize};

use crate::schema::FieldValue;

/// Where a value was found in the normalized report text.
/// Byte offsets, end exclusive; `line` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl SourceSpan {
    pub fn locate(text: &str, start: usize, end: usize) -> Self {
        let line = text
            .get(..start)
            .map(|prefix| prefix.matches('\n').count())
            .unwrap_or(0)
            + 1;
        Self { start, end, line }
    }
}

/// One possible value for a field found by one rule at one location.
/// Several candidates may exist for the same field; the reconciler picks one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateObservation {
    pub field_name: String,
    pub raw_value: String,
    pub parsed_value: FieldValue,
    pub unit: Option<String>,
    pub confidence: f64,
    pub source_span: SourceSpan,
    pub extraction_rule_id: String,
}
