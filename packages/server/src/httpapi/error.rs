use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::cron::CronError;
use crate::external::object_store::ObjectStoreError;

/// Maps a collaborator error into the management surface's HTTP response
/// shape. Every handler returns `Result<_, ApiError>` so the `?` operator
/// does the status-code mapping in one place.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ObjectStoreError> for ApiError {
    fn from(error: ObjectStoreError) -> Self {
        match error {
            ObjectStoreError::NotFound => ApiError::NotFound("not found".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CronError> for ApiError {
    fn from(error: CronError) -> Self {
        match error {
            CronError::JobNotFound(id) => ApiError::NotFound(format!("cron job {id} not found")),
            CronError::InvalidCronExpression(ref expr) => ApiError::BadRequest(format!("invalid cron expression: {expr}")),
            CronError::AlreadyRunning(id) => ApiError::BadRequest(format!("cron job {id} is already running")),
            CronError::Store(store_error) => store_error.into(),
        }
    }
}
