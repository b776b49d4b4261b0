use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use crate::common::AttendanceError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Error: {0}")]
    Internal(String),
}

impl From<AttendanceError> for AppError {
    fn from(e: AttendanceError) -> Self {
        match e {
            AttendanceError::InvalidInput(message) => AppError::BadRequest(message),
            AttendanceError::NotFound(message) => AppError::NotFound(message),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Internal(ref details) = self {
            tracing::error!("Request failed: {}", details);
        }

        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}
