use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sheets::SheetsError;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Server credential missing: {0}")]
    CredentialMissing(String),

    #[error("Spreadsheet store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<SheetsError> for AppError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::CredentialMissing(path) => {
                AppError::CredentialMissing(path.display().to_string())
            }
            SheetsError::InvalidRange(range) => AppError::InvalidInput(range),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::CredentialMissing { .. } | AppError::StoreUnavailable { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!("{status}: {self}");

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
