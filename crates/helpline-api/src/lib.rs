pub mod auth;
pub mod dashboard;
pub mod error;
pub mod middleware;
pub mod rooms;

use tracing::error;

use crate::error::ApiError;

/// Run blocking chat-engine work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, helpline_chat::ChatError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
