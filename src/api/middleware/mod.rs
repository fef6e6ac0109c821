//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth: resolves the caller's user id
//! 2. Audit: logs each request with the resolved user

pub mod audit;
pub mod auth;
