use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::flagged::store::CatalogError;

/// Error returned by HTTP handlers, rendered as `{ "error": "..." }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("userId is required")]
    MissingUserId,
    #[error("{0}")]
    BadRequest(String),
    /// The request body was not acceptable JSON (bad syntax, content type
    /// or shape). Keeps the status axum chose (400, 415 or 422).
    #[error("{1}")]
    InvalidBody(StatusCode, String),
    #[error("{0}")]
    Internal(String),
}

/// JSON body extractor whose rejections render as `ApiError`.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.status(), rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUserId | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Task join: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        // Internal details stay in the log.
        let message = match &self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Reject absent or blank user ids. The id itself is passed through as-is,
/// matching what the WebSocket handshake registers.
pub fn require_user_id(user_id: Option<&str>) -> Result<&str, ApiError> {
    match user_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::MissingUserId),
    }
}
