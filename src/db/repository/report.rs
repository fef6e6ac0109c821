use std::collections::BTreeMap;

use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use super::{now_timestamp, task_from_column};
use crate::db::DatabaseError;
use crate::pipeline::{ExtractedMeta, IngestionReport};
use crate::schema::{FieldValue, Task};

/// A persisted ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub id: String,
    pub user_id: String,
    pub task: Task,
    pub source_name: Option<String>,
    pub content_hash: String,
    pub extracted: BTreeMap<String, FieldValue>,
    pub extracted_meta: BTreeMap<String, ExtractedMeta>,
    pub missing_fields: Vec<String>,
    pub needs_confirmation: Vec<String>,
    pub out_of_range: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: String,
}

/// Store an ingestion result and return the new report id.
pub fn insert_report(
    conn: &Connection,
    user_id: &str,
    source_name: Option<&str>,
    content_hash: &str,
    report: &IngestionReport,
) -> Result<String, DatabaseError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO reports (id, user_id, task, source_name, content_hash, extracted,
         extracted_meta, missing_fields, needs_confirmation, out_of_range, warnings, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            user_id,
            report.task.as_str(),
            source_name,
            content_hash,
            serde_json::to_string(&report.resolved_fields)?,
            serde_json::to_string(&report.extracted_meta)?,
            serde_json::to_string(&report.missing_fields)?,
            serde_json::to_string(&report.needs_confirmation_fields)?,
            serde_json::to_string(&report.out_of_range_fields)?,
            serde_json::to_string(&report.warnings)?,
            now_timestamp(),
        ],
    )?;
    tracing::debug!(report_id = %id, task = %report.task, "Report stored");
    Ok(id)
}

const REPORT_COLUMNS: &str = "id, user_id, task, source_name, content_hash, extracted,
    extracted_meta, missing_fields, needs_confirmation, out_of_range, warnings, created_at";

struct ReportRow {
    id: String,
    user_id: String,
    task: String,
    source_name: Option<String>,
    content_hash: String,
    extracted: String,
    extracted_meta: String,
    missing_fields: String,
    needs_confirmation: String,
    out_of_range: String,
    warnings: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task: row.get(2)?,
        source_name: row.get(3)?,
        content_hash: row.get(4)?,
        extracted: row.get(5)?,
        extracted_meta: row.get(6)?,
        missing_fields: row.get(7)?,
        needs_confirmation: row.get(8)?,
        out_of_range: row.get(9)?,
        warnings: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<StoredReport, DatabaseError> {
    Ok(StoredReport {
        task: task_from_column(row.task)?,
        extracted: serde_json::from_str(&row.extracted)?,
        extracted_meta: serde_json::from_str(&row.extracted_meta)?,
        missing_fields: serde_json::from_str(&row.missing_fields)?,
        needs_confirmation: serde_json::from_str(&row.needs_confirmation)?,
        out_of_range: serde_json::from_str(&row.out_of_range)?,
        warnings: serde_json::from_str(&row.warnings)?,
        id: row.id,
        user_id: row.user_id,
        source_name: row.source_name,
        content_hash: row.content_hash,
        created_at: row.created_at,
    })
}

/// Fetch one of the user's reports. `None` when missing or owned by someone else.
pub fn get_report(
    conn: &Connection,
    user_id: &str,
    id: &str,
) -> Result<Option<StoredReport>, DatabaseError> {
    let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1 AND user_id = ?2");
    let result = conn.query_row(&sql, params![id, user_id], read_row);

    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The user's reports, newest first.
pub fn list_reports(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<StoredReport>, DatabaseError> {
    let sql = format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, limit as i64], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(report_from_row).collect()
}

/// True when `id` is one of the user's reports.
pub fn report_belongs_to(conn: &Connection, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reports WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
