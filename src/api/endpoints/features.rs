//! Feature schema lookup and completion.
//!
//! - `GET /api/features/schema?task=`: ordered field list for a task
//! - `POST /api/features/complete`: merge a report's extracted values with
//!   user inputs

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_task, ApiContext, UserContext};
use crate::db;
use crate::pipeline::reconcile::ResolvedMap;
use crate::pipeline::record::CompletionResult;
use crate::pipeline::resolved_from_meta;
use crate::schema::{FieldSchema, Task};

#[derive(Deserialize)]
pub struct SchemaQuery {
    pub task: Option<String>,
}

#[derive(Serialize)]
pub struct SchemaResponse {
    pub task: Task,
    pub requires_model: bool,
    pub fields: Vec<FieldSchema>,
}

/// `GET /api/features/schema`: field definitions in schema order.
pub async fn schema(
    State(ctx): State<ApiContext>,
    Query(query): Query<SchemaQuery>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let task = parse_task(query.task.as_deref())?;
    let schema = ctx.pipeline.schema(task);

    Ok(Json(SchemaResponse {
        task,
        requires_model: schema.requires_model,
        fields: schema.fields().cloned().collect(),
    }))
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub task: String,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub user_inputs: BTreeMap<String, serde_json::Value>,
}

/// `POST /api/features/complete`: fill in what extraction missed.
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompletionResult>, ApiError> {
    let task = parse_task(Some(req.task.as_str()))?;

    let extracted = match &req.report_id {
        Some(report_id) => {
            let conn = ctx.open_db()?;
            let report = db::get_report(&conn, &user.user_id, report_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Report {report_id} not found")))?;
            if report.task != task {
                return Err(ApiError::BadRequest(format!(
                    "Report {report_id} was ingested for task {}, not {task}",
                    report.task
                )));
            }
            resolved_from_meta(&report.extracted_meta)
        }
        None => ResolvedMap::new(),
    };

    let result = ctx.pipeline.complete(task, &extracted, &req.user_inputs)?;
    Ok(Json(result))
}
