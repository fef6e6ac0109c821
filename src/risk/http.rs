use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{RiskModel, RiskModelError};
use crate::pipeline::record::FeatureRecord;
use crate::pipeline::scoring::PredictionResult;
use crate::schema::{FieldValue, Task};

/// Risk model served over HTTP: `POST {url}` with `{task, features}`,
/// answered by `{label, probability}`.
pub struct HttpRiskModel {
    url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpRiskModel {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, RiskModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RiskModelError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    task: Task,
    features: &'a std::collections::BTreeMap<String, FieldValue>,
}

#[derive(Deserialize)]
struct PredictResponse {
    label: u8,
    probability: f64,
}

impl RiskModel for HttpRiskModel {
    fn predict(
        &self,
        task: Task,
        features: &FeatureRecord,
    ) -> Result<PredictionResult, RiskModelError> {
        let body = PredictRequest {
            task,
            features: features.values(),
        };

        tracing::debug!(task = %task, url = %self.url, "Calling risk model");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    RiskModelError::Connection(self.url.clone())
                } else if e.is_timeout() {
                    RiskModelError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    RiskModelError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RiskModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response
            .json()
            .map_err(|e| RiskModelError::ResponseParsing(e.to_string()))?;

        Ok(PredictionResult {
            label: parsed.label,
            probability: parsed.probability,
        })
    }
}
