//! Confidence triage: which fields are trusted, which need a human look,
//! which must be supplied.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extraction::thresholds;
use super::reconcile::ResolvedMap;
use crate::schema::TaskSchema;

#[derive(Error, Debug, PartialEq)]
pub enum TriageError {
    #[error("Invalid triage thresholds high={high}, medium={medium}: require 0 <= medium <= high <= 1")]
    InvalidThreshold { high: f64, medium: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    pub high: f64,
    pub medium: f64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            high: thresholds::HIGH,
            medium: thresholds::MEDIUM,
        }
    }
}

impl TriageConfig {
    pub fn validate(&self) -> Result<(), TriageError> {
        let valid = self.high.is_finite()
            && self.medium.is_finite()
            && 0.0 <= self.medium
            && self.medium <= self.high
            && self.high <= 1.0;
        if valid {
            Ok(())
        } else {
            Err(TriageError::InvalidThreshold {
                high: self.high,
                medium: self.medium,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageBucket {
    AutoAccepted,
    NeedsConfirmation,
    Missing,
}

/// Field names per bucket. `dropped` holds optional fields that are absent
/// or too uncertain; it is kept for auditing only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub auto_accepted: BTreeSet<String>,
    pub needs_confirmation: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub dropped: BTreeSet<String>,
}

impl TriageOutcome {
    pub fn bucket_of(&self, field: &str) -> Option<TriageBucket> {
        if self.auto_accepted.contains(field) {
            Some(TriageBucket::AutoAccepted)
        } else if self.needs_confirmation.contains(field) {
            Some(TriageBucket::NeedsConfirmation)
        } else if self.missing.contains(field) {
            Some(TriageBucket::Missing)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Thresholds are validated once, at construction.
#[derive(Debug, Clone, Copy)]
pub struct TriageEngine {
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Result<Self, TriageError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> TriageConfig {
        self.config
    }

    /// Bucket of one field. `None` means the field is dropped.
    pub fn classify(&self, confidence: Option<f64>, required: bool) -> Option<TriageBucket> {
        match confidence {
            Some(c) if c >= self.config.high => Some(TriageBucket::AutoAccepted),
            Some(c) if c >= self.config.medium => Some(TriageBucket::NeedsConfirmation),
            _ if required => Some(TriageBucket::Missing),
            _ => None,
        }
    }

    /// Classify every schema field. Resolved fields outside the schema are ignored.
    pub fn triage(&self, resolved: &ResolvedMap, schema: &TaskSchema) -> TriageOutcome {
        let mut outcome = TriageOutcome::default();

        for field in schema.fields() {
            let confidence = resolved.get(&field.name).map(|r| r.confidence);
            let name = field.name.clone();
            match self.classify(confidence, field.required) {
                Some(TriageBucket::AutoAccepted) => outcome.auto_accepted.insert(name),
                Some(TriageBucket::NeedsConfirmation) => outcome.needs_confirmation.insert(name),
                Some(TriageBucket::Missing) => outcome.missing.insert(name),
                None => outcome.dropped.insert(name),
            };
        }

        outcome
    }
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self {
            config: TriageConfig::default(),
        }
    }
}
