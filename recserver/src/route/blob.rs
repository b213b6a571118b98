use axum::{handler::HandlerWithoutStateExt, Router};
use tower_http::services::ServeDir;

use crate::{error::AppError, AppState};

/// `/uploads/{filename}` straight off the blob directory.
///
/// `ServeDir` answers `Range` requests (206/416), sets `Accept-Ranges` and
/// guesses the content type; names with `..` never leave the root.
pub fn route(root: &str) -> Router<AppState> {
    let serve_dir = ServeDir::new(root)
        .append_index_html_on_directories(false)
        .not_found_service(not_found.into_service());
    Router::new().nest_service("/uploads", serve_dir)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
