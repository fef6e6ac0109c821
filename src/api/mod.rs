//! HTTP API.
//!
//! Thin axum layer over the report pipeline: ingestion, feature completion,
//! scoring with the external risk model, and per-user history. Protected
//! routes live under `/api/` behind the Auth → Audit middleware stack;
//! `/health` is open.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::{ApiContext, UserContext};
