//! History repository: per-user reports and predictions.
//!
//! JSON-shaped columns are stored as serialized text. Every read is scoped by
//! `user_id`; rows of other users behave as if they did not exist.

mod prediction;
mod report;

pub use prediction::*;
pub use report::*;

use std::str::FromStr;

use chrono::{SecondsFormat, Utc};

use super::DatabaseError;
use crate::schema::Task;

/// Rows returned by list queries when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Fixed-width UTC timestamp so text ordering matches time ordering.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn task_from_column(value: String) -> Result<Task, DatabaseError> {
    Task::from_str(&value).map_err(|_| DatabaseError::InvalidEnum {
        field: "task".into(),
        value,
    })
}
