//! API endpoint handlers, one module per route group.

pub mod features;
pub mod health;
pub mod history;
pub mod ingest;
pub mod predict;
