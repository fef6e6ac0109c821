//! Shared types for the API layer.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::db;
use crate::pipeline::ReportPipeline;
use crate::risk::RiskModel;
use crate::schema::Task;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<ReportPipeline>,
    pub db_path: PathBuf,
    /// `None` when no risk model URL is configured.
    pub risk_model: Option<Arc<dyn RiskModel>>,
    pub disable_auth: bool,
    /// `None` allows any origin.
    pub allowed_origins: Option<Vec<String>>,
}

impl ApiContext {
    pub fn new(pipeline: Arc<ReportPipeline>, db_path: PathBuf) -> Self {
        Self {
            pipeline,
            db_path,
            risk_model: None,
            disable_auth: false,
            allowed_origins: None,
        }
    }

    pub fn with_risk_model(mut self, model: Arc<dyn RiskModel>) -> Self {
        self.risk_model = Some(model);
        self
    }

    /// Open a connection to the history database. One per request.
    pub fn open_db(&self) -> Result<Connection, ApiError> {
        db::open_database(&self.db_path).map_err(ApiError::from)
    }
}

/// Caller identity, injected into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

/// Parse a task id from a query string or body; absent counts as invalid.
pub fn parse_task(raw: Option<&str>) -> Result<Task, ApiError> {
    let raw = raw.unwrap_or_default();
    Task::from_str(raw).map_err(ApiError::from)
}
