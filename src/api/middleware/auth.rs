//! Caller identity middleware.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id in `X-User-Id`. This layer only requires the header and injects
//! [`UserContext`] for handlers. With auth disabled, requests without the
//! header run as the fixed test user.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::config::TEST_USER_ID;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Require a caller identity on protected routes.
pub async fn require_user(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_user_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_user_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let disable_auth = req
        .extensions()
        .get::<ApiContext>()
        .map(|ctx| ctx.disable_auth)
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let header_user = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let user_id = match header_user {
        Some(id) => id,
        None if disable_auth => TEST_USER_ID.to_string(),
        None => return Err(ApiError::AuthRequired),
    };

    req.extensions_mut().insert(UserContext { user_id });
    Ok(next.run(req).await)
}
