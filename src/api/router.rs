//! API router.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! Extension(ApiContext) → Auth → Audit → Handler.

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::middleware::auth::USER_ID_HEADER;
use crate::api::types::ApiContext;

/// Build the full application router.
///
/// Middleware reads `Extension<ApiContext>` (outermost layer); handlers use
/// `State<ApiContext>`.
pub fn api_router(ctx: ApiContext) -> Router {
    let protected = Router::new()
        .route("/ingest/report", post(endpoints::ingest::report))
        .route("/features/schema", get(endpoints::features::schema))
        .route("/features/complete", post(endpoints::features::complete))
        .route(
            "/predict/with_features",
            post(endpoints::predict::with_features),
        )
        .route("/score", post(endpoints::predict::score))
        .route("/history/reports", get(endpoints::history::reports))
        .route("/history/predictions", get(endpoints::history::predictions))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_user))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone());

    Router::new()
        .nest("/api", protected)
        .merge(unprotected)
        .layer(cors_layer(ctx.allowed_origins.as_deref()))
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origin = match allowed_origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %o, "Ignoring malformed CORS origin");
                        None
                    }
                }),
        ),
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-user-id")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::scoring::ScoringConfig;
    use crate::pipeline::triage::TriageConfig;
    use crate::pipeline::ReportPipeline;
    use crate::risk::MockRiskModel;
    use crate::schema::SchemaRegistry;

    /// Context backed by a temp database; keep the guard alive for the test.
    fn test_ctx() -> (ApiContext, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Arc::new(SchemaRegistry::builtin().unwrap());
        let pipeline = Arc::new(
            ReportPipeline::new(registry, TriageConfig::default(), ScoringConfig::default())
                .unwrap(),
        );
        let ctx = ApiContext::new(pipeline, tmp.path().join("history.db"));
        (ctx, tmp)
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(u) = user {
            builder = builder.header(USER_ID_HEADER, u);
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_is_open() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_user() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(&app, request("GET", "/api/history/reports", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn disabled_auth_uses_test_user() {
        let (mut ctx, _tmp) = test_ctx();
        ctx.disable_auth = true;
        let app = api_router(ctx);

        let (status, json) = send(
            &app,
            request("POST", "/api/ingest/report?task=heart", None, Some(json!({"text": "Cholesterol: 180"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let report_id = json["report_id"].as_str().unwrap().to_string();

        let (_, reports) = send(&app, request("GET", "/api/history/reports", Some("test-user"), None)).await;
        assert_eq!(reports[0]["id"], report_id.as_str());
        assert_eq!(reports[0]["user_id"], "test-user");
    }

    #[tokio::test]
    async fn ingest_rejects_invalid_task() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request("POST", "/api/ingest/report?task=kidney", Some("alice"), Some(json!({"text": "Age: 54"}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "INVALID_TASK");
    }

    #[tokio::test]
    async fn ingest_rejects_empty_text() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request("POST", "/api/ingest/report?task=heart", Some("alice"), Some(json!({"text": " \n\u{0000}\t "}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "EMPTY_TEXT");
    }

    #[tokio::test]
    async fn ingest_returns_triaged_fields() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request(
                "POST",
                "/api/ingest/report?task=heart",
                Some("alice"),
                Some(json!({"text": "Cholesterol: 260 mg/dL", "source_name": "labs.txt"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["report_id"].is_string());
        assert_eq!(json["task"], "heart");
        assert_eq!(json["resolved_fields"]["chol"], 260.0);
        assert!(json["out_of_range_fields"].as_array().unwrap().contains(&json!("chol")));
        assert!(json["missing_fields"].as_array().unwrap().contains(&json!("age")));
    }

    #[tokio::test]
    async fn schema_lists_fields_in_order() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) =
            send(&app, request("GET", "/api/features/schema?task=heart", Some("alice"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fields"].as_array().unwrap().len(), 13);
        assert_eq!(json["fields"][0]["name"], "age");
        assert_eq!(json["requires_model"], true);
    }

    #[tokio::test]
    async fn complete_from_report_with_overrides() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (_, ingested) = send(
            &app,
            request("POST", "/api/ingest/report?task=heart", Some("alice"), Some(json!({"text": "Cholesterol: 260 mg/dL\nAge: 54"}))),
        )
        .await;
        let report_id = ingested["report_id"].as_str().unwrap();

        let (status, json) = send(
            &app,
            request(
                "POST",
                "/api/features/complete",
                Some("alice"),
                Some(json!({"task": "heart", "report_id": report_id, "user_inputs": {"chol": 240}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let chol = json["features_ready"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["field_name"] == "chol")
            .unwrap()
            .clone();
        assert_eq!(chol["value"], 240.0);
        assert_eq!(chol["source"], "user");
        assert_eq!(json["notes"][0], "User values override extracted values");

        // Another user cannot complete from alice's report.
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/api/features/complete",
                Some("bob"),
                Some(json!({"task": "heart", "report_id": report_id, "user_inputs": {}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn heart_features() -> Value {
        json!({
            "age": 54, "sex": "male", "cp": "typical angina",
            "trestbps": 115, "chol": 215, "thalach": 150
        })
    }

    #[tokio::test]
    async fn predict_without_model_is_unavailable() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request("POST", "/api/predict/with_features", Some("alice"), Some(json!({"task": "heart", "features": heart_features()}))),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "MODEL_UNAVAILABLE");
    }

    #[tokio::test]
    async fn predict_rejects_incomplete_features() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx.with_risk_model(Arc::new(MockRiskModel::new(1, 0.8))));
        let (status, json) = send(
            &app,
            request("POST", "/api/predict/with_features", Some("alice"), Some(json!({"task": "heart", "features": {"chol": 215}}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "EXTRACTION_INCOMPLETE");
    }

    #[tokio::test]
    async fn predict_scores_and_persists() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx.with_risk_model(Arc::new(MockRiskModel::new(1, 0.8))));
        let (status, json) = send(
            &app,
            request("POST", "/api/predict/with_features", Some("alice"), Some(json!({"task": "heart", "features": heart_features()}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["label"], 1);
        assert_eq!(json["probability"], 0.8);
        assert_eq!(json["health_score"], 18.0);
        assert_eq!(json["top_contributors"][0]["field_name"], "chol");
        let prediction_id = json["prediction_id"].as_str().unwrap().to_string();

        let (_, history) =
            send(&app, request("GET", "/api/history/predictions", Some("alice"), None)).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["id"], prediction_id.as_str());

        let (_, other) = send(&app, request("GET", "/api/history/predictions", Some("bob"), None)).await;
        assert!(other.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn predict_model_failure_is_unavailable() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx.with_risk_model(Arc::new(MockRiskModel::failing("down"))));
        let (status, _) = send(
            &app,
            request("POST", "/api/predict/with_features", Some("alice"), Some(json!({"task": "heart", "features": heart_features()}))),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn predict_general_needs_no_model() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request("POST", "/api/predict/with_features", Some("alice"), Some(json!({"task": "general", "features": {"glucose": 98}}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["label"].is_null());
        assert!(json["health_score"].is_null());
    }

    #[tokio::test]
    async fn score_without_prediction_is_incomplete() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request("POST", "/api/score", Some("alice"), Some(json!({"task": "heart", "features": {"chol": 215}}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "EXTRACTION_INCOMPLETE");
    }

    #[tokio::test]
    async fn score_with_prediction() {
        let (ctx, _tmp) = test_ctx();
        let app = api_router(ctx);
        let (status, json) = send(
            &app,
            request(
                "POST",
                "/api/score",
                Some("alice"),
                Some(json!({"task": "heart", "features": {"chol": 215}, "prediction": {"label": 1, "probability": 0.8}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["health_score"], 18.0);
    }
}
