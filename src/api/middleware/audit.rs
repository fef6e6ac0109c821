//! Access logging middleware. Runs innermost, after auth has injected
//! [`UserContext`].

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::UserContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user = req
        .extensions()
        .get::<UserContext>()
        .map(|u| u.user_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        user = %user,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "API access"
    );

    response
}
