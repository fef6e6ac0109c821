use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extraction::{clamp_confidence, CandidateObservation};
use crate::schema::FieldValue;

/// The single accepted value of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub field_name: String,
    pub value: FieldValue,
    pub unit: Option<String>,
    pub confidence: f64,
    pub source_rule_id: String,
}

/// Resolved fields keyed by field name.
pub type ResolvedMap = BTreeMap<String, ResolvedField>;

impl From<&CandidateObservation> for ResolvedField {
    fn from(c: &CandidateObservation) -> Self {
        Self {
            field_name: c.field_name.clone(),
            value: c.parsed_value.clone(),
            unit: c.unit.clone(),
            confidence: clamp_confidence(c.confidence),
            source_rule_id: c.extraction_rule_id.clone(),
        }
    }
}

/// Collapse candidates into one value per field.
///
/// Highest confidence wins. Equal confidence: smallest rule id. Same rule id:
/// the earlier candidate. A zero-confidence candidate still wins when alone.
pub fn resolve(candidates: &[CandidateObservation]) -> ResolvedMap {
    let mut best: BTreeMap<&str, &CandidateObservation> = BTreeMap::new();

    for candidate in candidates {
        let name = candidate.field_name.as_str();
        let replace = best
            .get(name)
            .map_or(true, |current| beats(candidate, current));
        if replace {
            best.insert(name, candidate);
        }
    }

    best.into_iter()
        .map(|(name, c)| (name.to_string(), ResolvedField::from(c)))
        .collect()
}

fn beats(challenger: &CandidateObservation, current: &CandidateObservation) -> bool {
    let a = clamp_confidence(challenger.confidence);
    let b = clamp_confidence(current.confidence);
    a > b || (a == b && challenger.extraction_rule_id < current.extraction_rule_id)
}
