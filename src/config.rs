use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::triage::TriageConfig;

/// Application-level constants
pub const APP_NAME: &str = "Medscore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address for the HTTP API.
const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default timeout for a single risk model call.
const DEFAULT_RISK_MODEL_TIMEOUT_SECS: u64 = 30;

/// User id assumed when auth is disabled and no identity header is sent.
pub const TEST_USER_ID: &str = "test-user";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medscore=info,medscore_lib=info,tower_http=warn"
}

/// Get the application data directory.
/// ~/Medscore/ unless overridden by `MEDSCORE_DATA_DIR`.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => PathBuf::from(APP_NAME),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub risk_model_url: Option<String>,
    pub risk_model_timeout_secs: u64,
    pub triage: TriageConfig,
    pub schema_file: Option<PathBuf>,
    pub disable_auth: bool,
    /// `None` means any origin.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: app_data_dir(),
            risk_model_url: None,
            risk_model_timeout_secs: DEFAULT_RISK_MODEL_TIMEOUT_SECS,
            triage: TriageConfig::default(),
            schema_file: None,
            disable_auth: false,
            allowed_origins: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("MEDSCORE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "MEDSCORE_BIND",
                value: bind_raw.clone(),
            })?;

        let risk_model_timeout_secs = match get("MEDSCORE_RISK_MODEL_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "MEDSCORE_RISK_MODEL_TIMEOUT_SECS",
                value: raw,
            })?,
            None => defaults.risk_model_timeout_secs,
        };

        let high = parse_f64(get("MEDSCORE_TRIAGE_HIGH"), "MEDSCORE_TRIAGE_HIGH")?
            .unwrap_or(defaults.triage.high);
        let medium = parse_f64(get("MEDSCORE_TRIAGE_MEDIUM"), "MEDSCORE_TRIAGE_MEDIUM")?
            .unwrap_or(defaults.triage.medium);

        let disable_auth = match get("MEDSCORE_DISABLE_AUTH") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: "MEDSCORE_DISABLE_AUTH",
                value: raw,
            })?,
            None => false,
        };

        let allowed_origins = match get("MEDSCORE_ALLOWED_ORIGINS") {
            Some(raw) if raw != "*" => Some(
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            data_dir: get("MEDSCORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            risk_model_url: get("MEDSCORE_RISK_MODEL_URL"),
            risk_model_timeout_secs,
            // Range is checked when the triage engine is built.
            triage: TriageConfig { high, medium },
            schema_file: get("MEDSCORE_SCHEMA_FILE").map(PathBuf::from),
            disable_auth,
            allowed_origins,
        })
    }

    /// Path of the history database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
}

fn parse_f64(raw: Option<String>, key: &'static str) -> Result<Option<f64>, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
