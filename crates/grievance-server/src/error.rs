//! Engine errors rendered as `{error, code}` JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grievance_core::errors::CausalError;
use grievance_core::GrievanceError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] GrievanceError),
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("batch of {size} reports exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Engine(err) => engine_parts(err),
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, *code, message.clone()),
            Self::BatchTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "batch_too_large",
                self.to_string(),
            ),
            Self::Internal(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal error".to_string(),
                )
            }
        }
    }
}

fn engine_parts(err: &GrievanceError) -> (StatusCode, &'static str, String) {
    match err {
        GrievanceError::InvalidReport(_) => (StatusCode::BAD_REQUEST, "invalid_report", err.to_string()),
        GrievanceError::ClusterNotFound { .. } => {
            (StatusCode::NOT_FOUND, "cluster_not_found", err.to_string())
        }
        GrievanceError::Causal(CausalError::UnknownNode { .. }) => {
            (StatusCode::NOT_FOUND, "unknown_node", err.to_string())
        }
        GrievanceError::Causal(_) => (
            StatusCode::BAD_REQUEST,
            "invalid_intervention",
            err.to_string(),
        ),
        GrievanceError::ClusteringTimeout { .. } | GrievanceError::Concurrency(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "busy",
            "engine busy, retry later".to_string(),
        ),
        other => {
            error!(error = %other, "engine error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.parts();
        (status, Json(ErrorBody { error, code })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
