//! `GET /api/history/reports` and `GET /api/history/predictions`: the
//! caller's own rows, newest first.

use axum::extract::{Query, State};
use axum::Extension;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::db::{self, StoredPrediction, StoredReport, DEFAULT_HISTORY_LIMIT};

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, DEFAULT_HISTORY_LIMIT)
    }
}

pub async fn reports(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<StoredReport>>, ApiError> {
    let conn = ctx.open_db()?;
    let rows = db::list_reports(&conn, &user.user_id, query.limit())?;
    Ok(Json(rows))
}

pub async fn predictions(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<StoredPrediction>>, ApiError> {
    let conn = ctx.open_db()?;
    let rows = db::list_predictions(&conn, &user.user_id, query.limit())?;
    Ok(Json(rows))
}
