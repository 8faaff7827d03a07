//! HTTP error mapping.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Errors returned by handlers. Every variant renders as `{"detail": ...}`.
#[derive(Debug)]
pub enum AppError {
    NotFound,
    BadRequest(String),
    Validation(String),
    /// Internal failure with a structured detail body.
    Generation(Value),
    Internal(String),
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, Value) {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, json!("Todo not found")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!(msg)),
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, json!(msg)),
            Self::Generation(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!(msg)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("request failed: {err:#}");
        Self::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
