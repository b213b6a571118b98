use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use tracing::error;

use api::response::ErrorBody;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound,
    StorageError(String),
    InternalServerError(anyhow::Error),
}

impl AppError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::StorageError(msg) => {
                error!("storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::InternalServerError(err) => {
                error!("internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError::InternalServerError(err.into())
    }
}
