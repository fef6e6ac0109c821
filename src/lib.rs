pub mod api;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod risk;
pub mod schema;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use api::ApiContext;
use config::{AppConfig, ConfigError};
use db::DatabaseError;
use pipeline::scoring::ScoringConfig;
use pipeline::{PipelineError, ReportPipeline};
use risk::{HttpRiskModel, RiskModelError};
use schema::{SchemaError, SchemaRegistry};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Pipeline setup failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Risk model client error: {0}")]
    RiskModel(#[from] RiskModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(e) = serve() {
        tracing::error!(error = %e, "Startup failed");
        std::process::exit(1);
    }
}

fn serve() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    let ctx = build_context(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let server = api::start_api_server(ctx, config.bind_addr)
            .await
            .map_err(StartupError::Server)?;
        tracing::info!(addr = %server.addr, "Listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for shutdown signal: {e}");
        }
        server.stop().await;
        Ok::<(), StartupError>(())
    })
}

/// Load the schema registry, compile the pipeline, migrate the history
/// database and wire the risk model client.
pub fn build_context(config: &AppConfig) -> Result<ApiContext, StartupError> {
    let registry = match &config.schema_file {
        Some(path) => SchemaRegistry::with_overrides(path)?,
        None => SchemaRegistry::builtin()?,
    };
    let pipeline = ReportPipeline::new(Arc::new(registry), config.triage, ScoringConfig::default())?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.database_path();
    db::open_database(&db_path)?;
    tracing::info!(path = %db_path.display(), "History database ready");

    let mut ctx = ApiContext::new(Arc::new(pipeline), db_path);
    ctx.disable_auth = config.disable_auth;
    ctx.allowed_origins = config.allowed_origins.clone();
    if config.disable_auth {
        tracing::warn!("Authentication disabled; requests without X-User-Id run as the test user");
    }

    match &config.risk_model_url {
        Some(url) => {
            let model = HttpRiskModel::new(url, config.risk_model_timeout_secs)?;
            tracing::info!(url = %model.url(), "Risk model configured");
            ctx = ctx.with_risk_model(Arc::new(model));
        }
        None => tracing::warn!("No risk model URL configured; predictions will be unavailable"),
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::triage::{TriageConfig, TriageError};

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: dir.join("data"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn build_context_creates_database() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let ctx = build_context(&config).unwrap();
        assert!(config.database_path().exists());
        assert!(ctx.risk_model.is_none());
        assert!(!ctx.disable_auth);
    }

    #[test]
    fn build_context_wires_risk_model() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            risk_model_url: Some("http://127.0.0.1:8500/predict".into()),
            ..config_in(tmp.path())
        };
        let ctx = build_context(&config).unwrap();
        assert!(ctx.risk_model.is_some());
    }

    #[test]
    fn invalid_thresholds_fail_startup() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            triage: TriageConfig { high: 0.5, medium: 0.9 },
            ..config_in(tmp.path())
        };
        let Err(err) = build_context(&config) else {
            panic!("inverted thresholds must fail startup");
        };
        assert!(matches!(
            err,
            StartupError::Pipeline(PipelineError::Triage(TriageError::InvalidThreshold { .. }))
        ));
    }

    #[test]
    fn missing_schema_file_fails_startup() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            schema_file: Some(tmp.path().join("missing.json")),
            ..config_in(tmp.path())
        };
        assert!(matches!(
            build_context(&config),
            Err(StartupError::Schema(SchemaError::ReferenceDataLoad(..)))
        ));
    }
}
