//! Scoring endpoints.
//!
//! - `POST /api/predict/with_features`: call the risk model on confirmed
//!   features, aggregate the health score and store the prediction
//! - `POST /api/score`: pure scoring with a caller-supplied prediction

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_task, ApiContext, UserContext};
use crate::db;
use crate::pipeline::record::FeatureRecord;
use crate::pipeline::scoring::PredictionResult;
use crate::pipeline::ScoringReport;

#[derive(Deserialize)]
pub struct PredictRequest {
    pub task: String,
    #[serde(default)]
    pub features: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub report_id: Option<String>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction_id: String,
    #[serde(flatten)]
    pub report: ScoringReport,
}

/// `POST /api/predict/with_features`
pub async fn with_features(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let task = parse_task(Some(req.task.as_str()))?;
    let schema = ctx.pipeline.schema(task);
    let record = FeatureRecord::from_inputs(schema, &req.features)?;

    let missing = record.missing_required(schema);
    if !missing.is_empty() {
        return Err(ApiError::ExtractionIncomplete(missing));
    }

    if let Some(report_id) = &req.report_id {
        let conn = ctx.open_db()?;
        if !db::report_belongs_to(&conn, &user.user_id, report_id)? {
            return Err(ApiError::NotFound(format!("Report {report_id} not found")));
        }
    }

    let prediction = if schema.requires_model {
        let model = ctx
            .risk_model
            .clone()
            .ok_or_else(|| ApiError::ModelUnavailable("no risk model configured".into()))?;
        let features = record.clone();
        let prediction = tokio::task::spawn_blocking(move || model.predict(task, &features))
            .await
            .map_err(|e| ApiError::Internal(format!("risk model task failed: {e}")))??;
        prediction
            .validate()
            .map_err(|e| ApiError::ModelUnavailable(e.to_string()))?;
        Some(prediction)
    } else {
        None
    };

    let report = ctx.pipeline.score(prediction.as_ref(), &record)?;

    let conn = ctx.open_db()?;
    let prediction_id = db::insert_prediction(
        &conn,
        &user.user_id,
        req.report_id.as_deref(),
        record.values(),
        &report,
    )?;

    tracing::info!(
        prediction_id = %prediction_id,
        task = %task,
        health_score = ?report.health_score,
        "Prediction scored"
    );

    Ok(Json(PredictResponse {
        prediction_id,
        report,
    }))
}

#[derive(Deserialize)]
pub struct ScoreRequest {
    pub task: String,
    #[serde(default)]
    pub features: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub prediction: Option<PredictionResult>,
}

/// `POST /api/score`: nothing is stored.
pub async fn score(
    State(ctx): State<ApiContext>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoringReport>, ApiError> {
    let task = parse_task(Some(req.task.as_str()))?;
    let record = FeatureRecord::from_inputs(ctx.pipeline.schema(task), &req.features)?;
    let report = ctx.pipeline.score(req.prediction.as_ref(), &record)?;
    Ok(Json(report))
}
