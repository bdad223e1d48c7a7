use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use herald_shared::{ContentError, UnknownSetting};
use herald_store::StoreError;

use crate::auth::VerifyError;
use crate::cache::CacheError;
use crate::fanout::FanOutError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    UnknownSetting(#[from] UnknownSetting),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<VerifyError> for ServerError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Cache(e) => Self::Cache(e),
            VerifyError::Store(e) => Self::Store(e),
        }
    }
}

impl From<FanOutError> for ServerError {
    fn from(err: FanOutError) -> Self {
        match err {
            FanOutError::Content(e) => Self::Content(e),
            FanOutError::PostNotFound(id) => Self::PostNotFound(id.to_string()),
            FanOutError::NotAuthor(id) => Self::Forbidden(format!("post {id} belongs to another user")),
            FanOutError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::PostNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Content(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::UnknownSetting(_) | ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Store(_) => {
                tracing::error!(error = %self, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ServerError::Cache(_) => {
                tracing::error!(error = %self, "Cache failure");
                (StatusCode::SERVICE_UNAVAILABLE, "Cache unavailable".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
