//! Schema registry: canonical per-task feature definitions.
//!
//! Built once at startup (optionally with a JSON override file) and shared
//! read-only for the life of the process.

pub mod reference;
pub mod registry;
pub mod tables;
pub mod types;

pub use registry::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown task '{0}'. Expected one of: heart, diabetes, general")]
    UnknownTask(String),

    #[error("Invalid field '{field}' in task {task}: {reason}")]
    InvalidField {
        task: Task,
        field: String,
        reason: String,
    },

    #[error("Duplicate field '{field}' in task {task}")]
    DuplicateField { task: Task, field: String },

    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),
}
