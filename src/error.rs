use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use diesel::result::Error as DieselError;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Request-level failures: these fail the whole call. Per-element failures
/// inside a push batch are counted instead, see `ingest::AttemptError`.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not logged in")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Database error")]
    Database(#[from] DieselError),
    #[error("Connection pool error")]
    Pool(#[from] r2d2::Error),
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SyncError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            SyncError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            SyncError::Database(e) => {
                log::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            SyncError::Pool(e) => {
                log::error!("Connection pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
        };

        let body = json!({
            "error": message,
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationErrors> for SyncError {
    fn from(err: ValidationErrors) -> Self {
        SyncError::BadRequest(err.to_string())
    }
}
