//! `POST /api/ingest/report`: run a report's text through the pipeline and
//! store the result in the caller's history.

use axum::extract::{Query, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_task, ApiContext, UserContext};
use crate::db;
use crate::pipeline::extraction::normalize_report_text;
use crate::pipeline::hash::content_hash;
use crate::pipeline::IngestionReport;

#[derive(Deserialize)]
pub struct IngestQuery {
    pub task: Option<String>,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub text: String,
    #[serde(default)]
    pub source_name: Option<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub report_id: String,
    #[serde(flatten)]
    pub report: IngestionReport,
}

pub async fn report(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<IngestQuery>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let task = parse_task(query.task.as_deref())?;

    let normalized = normalize_report_text(&req.text);
    if normalized.is_empty() {
        return Err(ApiError::EmptyText);
    }

    let report = ctx.pipeline.ingest(&normalized, task);

    let conn = ctx.open_db()?;
    let source_name = req.source_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let report_id = db::insert_report(
        &conn,
        &user.user_id,
        source_name,
        &content_hash(&normalized),
        &report,
    )?;

    Ok(Json(IngestResponse { report_id, report }))
}
