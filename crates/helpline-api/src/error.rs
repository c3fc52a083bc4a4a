use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use helpline_chat::ChatError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, (*m).to_string()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, (*m).to_string()),
            ApiError::Chat(ChatError::NoAdminAvailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            ApiError::Chat(ChatError::RoomNotFound) => (
                StatusCode::NOT_FOUND,
                "No chat room exists with this user.".to_string(),
            ),
            // Codec, store and corruption failures are never detailed to
            // clients, but must not pass silently either.
            ApiError::Chat(e) => {
                error!("chat engine error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
