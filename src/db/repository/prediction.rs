use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use super::{now_timestamp, report_belongs_to, task_from_column};
use crate::db::DatabaseError;
use crate::pipeline::scoring::Contributor;
use crate::pipeline::ScoringReport;
use crate::schema::{FieldValue, Task};

/// Short description of the report a prediction was made from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub id: String,
    pub source_name: Option<String>,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrediction {
    pub id: String,
    pub user_id: String,
    pub report_id: Option<String>,
    pub task: Task,
    pub features: BTreeMap<String, FieldValue>,
    pub label: Option<u8>,
    pub probability: Option<f64>,
    pub health_score: Option<f64>,
    pub top_contributors: Vec<Contributor>,
    pub warnings: Vec<String>,
    pub created_at: String,
    pub report: Option<ReportSummary>,
}

/// Store a scoring result. A `report_id` must name one of the user's own
/// reports, otherwise the insert fails with `NotFound`.
pub fn insert_prediction(
    conn: &Connection,
    user_id: &str,
    report_id: Option<&str>,
    features: &BTreeMap<String, FieldValue>,
    scoring: &ScoringReport,
) -> Result<String, DatabaseError> {
    if let Some(report_id) = report_id {
        if !report_belongs_to(conn, user_id, report_id)? {
            return Err(DatabaseError::NotFound {
                entity_type: "Report".into(),
                id: report_id.to_string(),
            });
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO predictions (id, user_id, report_id, task, features, label, probability,
         health_score, top_contributors, warnings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            user_id,
            report_id,
            scoring.task.as_str(),
            serde_json::to_string(features)?,
            scoring.label.map(i64::from),
            scoring.probability,
            scoring.health_score,
            serde_json::to_string(&scoring.top_contributors)?,
            serde_json::to_string(&scoring.warnings)?,
            now_timestamp(),
        ],
    )?;
    tracing::debug!(prediction_id = %id, task = %scoring.task, "Prediction stored");
    Ok(id)
}

struct PredictionRow {
    id: String,
    user_id: String,
    report_id: Option<String>,
    task: String,
    features: String,
    label: Option<i64>,
    probability: Option<f64>,
    health_score: Option<f64>,
    top_contributors: String,
    warnings: String,
    created_at: String,
    report_source_name: Option<String>,
    report_task: Option<String>,
    report_found: bool,
}

fn prediction_from_row(row: PredictionRow) -> Result<StoredPrediction, DatabaseError> {
    let report = match (&row.report_id, row.report_found) {
        (Some(id), true) => Some(ReportSummary {
            id: id.clone(),
            source_name: row.report_source_name,
            task: task_from_column(row.report_task.unwrap_or_default())?,
        }),
        _ => None,
    };
    let label = row
        .label
        .map(|l| {
            u8::try_from(l).map_err(|_| DatabaseError::InvalidEnum {
                field: "label".into(),
                value: l.to_string(),
            })
        })
        .transpose()?;

    Ok(StoredPrediction {
        task: task_from_column(row.task)?,
        features: serde_json::from_str(&row.features)?,
        top_contributors: serde_json::from_str(&row.top_contributors)?,
        warnings: serde_json::from_str(&row.warnings)?,
        id: row.id,
        user_id: row.user_id,
        report_id: row.report_id,
        label,
        probability: row.probability,
        health_score: row.health_score,
        created_at: row.created_at,
        report,
    })
}

/// The user's predictions, newest first, each with a summary of its report.
pub fn list_predictions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<StoredPrediction>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.report_id, p.task, p.features, p.label, p.probability,
         p.health_score, p.top_contributors, p.warnings, p.created_at,
         r.source_name, r.task, r.id IS NOT NULL
         FROM predictions p
         LEFT JOIN reports r ON r.id = p.report_id AND r.user_id = p.user_id
         WHERE p.user_id = ?1
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], |row| {
            Ok(PredictionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                report_id: row.get(2)?,
                task: row.get(3)?,
                features: row.get(4)?,
                label: row.get(5)?,
                probability: row.get(6)?,
                health_score: row.get(7)?,
                top_contributors: row.get(8)?,
                warnings: row.get(9)?,
                created_at: row.get(10)?,
                report_source_name: row.get(11)?,
                report_task: row.get(12)?,
                report_found: row.get(13)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(prediction_from_row).collect()
}
