//! Client side of the external risk model.
//!
//! The model itself (training, weights, serving) lives outside this service.
//! [`RiskModel`] is the seam handlers call through; [`HttpRiskModel`] is the
//! production implementation.

pub mod http;

pub use http::HttpRiskModel;

use thiserror::Error;

use crate::pipeline::record::FeatureRecord;
use crate::pipeline::scoring::PredictionResult;
use crate::schema::Task;

#[derive(Error, Debug)]
pub enum RiskModelError {
    #[error("Risk model is not reachable at {0}")]
    Connection(String),

    #[error("Risk model returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Binary risk classifier for a task's feature vector.
pub trait RiskModel: Send + Sync {
    fn predict(&self, task: Task, features: &FeatureRecord)
        -> Result<PredictionResult, RiskModelError>;
}

/// Fixed-output model for tests.
#[cfg(test)]
pub struct MockRiskModel {
    result: Result<PredictionResult, String>,
}

#[cfg(test)]
impl MockRiskModel {
    pub fn new(label: u8, probability: f64) -> Self {
        Self {
            result: Ok(PredictionResult { label, probability }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[cfg(test)]
impl RiskModel for MockRiskModel {
    fn predict(
        &self,
        _task: Task,
        _features: &FeatureRecord,
    ) -> Result<PredictionResult, RiskModelError> {
        self.result
            .clone()
            .map_err(RiskModelError::Connection)
    }
}
