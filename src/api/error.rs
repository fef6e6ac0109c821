//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::pipeline::record::RecordError;
use crate::pipeline::scoring::ScoringError;
use crate::pipeline::PipelineError;
use crate::risk::RiskModelError;
use crate::schema::SchemaError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    AuthRequired,
    #[error("Invalid task: {0}")]
    InvalidTask(String),
    #[error("Report text is empty")]
    EmptyText,
    #[error("Missing required fields: {}", .0.join(", "))]
    ExtractionIncomplete(Vec<String>),
    #[error("Invalid features: {0}")]
    InvalidFeatures(String),
    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),
    #[error("Risk model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::InvalidTask(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_TASK",
                self.to_string(),
            ),
            ApiError::EmptyText => (
                StatusCode::BAD_REQUEST,
                "EMPTY_TEXT",
                "Report text is empty".to_string(),
            ),
            ApiError::ExtractionIncomplete(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_INCOMPLETE",
                self.to_string(),
            ),
            ApiError::InvalidFeatures(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_FEATURES",
                detail.clone(),
            ),
            ApiError::InvalidPrediction(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_PREDICTION",
                detail.clone(),
            ),
            ApiError::ModelUnavailable(detail) => {
                tracing::warn!(detail, "Risk model unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "MODEL_UNAVAILABLE",
                    "Risk model is unavailable, try again later".to_string(),
                )
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownTask(task) => ApiError::InvalidTask(task),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        ApiError::InvalidFeatures(err.to_string())
    }
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::MissingPrediction(_) => {
                ApiError::ExtractionIncomplete(vec!["prediction".to_string()])
            }
            ScoringError::InvalidPrediction(detail) => ApiError::InvalidPrediction(detail),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Schema(e) => e.into(),
            PipelineError::Record(e) => e.into(),
            PipelineError::Scoring(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RiskModelError> for ApiError {
    fn from(err: RiskModelError) -> Self {
        ApiError::ModelUnavailable(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use crate::schema::Task;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn auth_required_returns_401() {
        let response = ApiError::AuthRequired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn unknown_task_maps_to_invalid_task() {
        let err: ApiError = SchemaError::UnknownTask("kidney".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_TASK");
        assert!(json["error"]["message"].as_str().unwrap().contains("kidney"));
    }

    #[tokio::test]
    async fn empty_text_returns_400() {
        let response = ApiError::EmptyText.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "EMPTY_TEXT");
    }

    #[tokio::test]
    async fn missing_prediction_maps_to_extraction_incomplete() {
        let err: ApiError = ScoringError::MissingPrediction(Task::Heart).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "EXTRACTION_INCOMPLETE");
    }

    #[tokio::test]
    async fn extraction_incomplete_lists_fields() {
        let err = ApiError::ExtractionIncomplete(vec!["age".into(), "sex".into()]);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"]["message"], "Missing required fields: age, sex");
    }

    #[tokio::test]
    async fn model_errors_hide_details() {
        let err: ApiError = RiskModelError::Connection("http://10.0.0.5:8500".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "MODEL_UNAVAILABLE");
        assert!(!json["error"]["message"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn database_not_found_maps_to_404() {
        let err: ApiError = DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: "abc".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
