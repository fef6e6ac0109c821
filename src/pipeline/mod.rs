pub mod extraction;
pub mod hash;
pub mod processor;
pub mod reconcile;
pub mod record;
pub mod scoring;
pub mod triage;
pub mod validation;

pub use processor::*;

use thiserror::Error;

use crate::schema::SchemaError;
use extraction::ExtractionError;
use record::RecordError;
use scoring::ScoringError;
use triage::TriageError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Extraction setup failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Triage configuration error: {0}")]
    Triage(#[from] TriageError),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Invalid features: {0}")]
    Record(#[from] RecordError),
}
