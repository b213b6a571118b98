use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    response::Json,
    routing::get,
    Router,
};
use tracing::{error, info, warn};

use api::path;
use api::recording::Recording;

use crate::service::recordings::RecordingsService;
use crate::{error::AppError, result::Result, AppState};

pub fn route() -> Router<AppState> {
    Router::new()
        .route(path::RECORDINGS, get(list).post(upload))
        .route("/api/recordings/:id", get(show))
}

async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Recording>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(path::UPLOAD_FIELD) {
            warn!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let original = field.file_name().map(str::to_string);
        let mut writer = state
            .blobs
            .create(original.as_deref())
            .await
            .map_err(AppError::storage)?;

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = writer.write(chunk).await {
                        writer.abort().await;
                        return Err(AppError::storage(e));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    writer.abort().await;
                    return Err(AppError::BadRequest(e.body_text()));
                }
            }
        }
        let stored = writer.finish().await.map_err(AppError::storage)?;

        let size = i64::try_from(stored.size).map_err(AppError::storage)?;
        let inserted =
            RecordingsService::insert(state.database.get_connection(), &stored.name, size).await;
        let model = match inserted {
            Ok(model) => model,
            Err(e) => {
                error!("Failed to insert recording row for {}: {}", stored.name, e);
                if let Err(e) = state.blobs.delete(&stored.name).await {
                    warn!("Orphan blob {} left behind: {}", stored.name, e);
                }
                return Err(AppError::storage(e));
            }
        };

        info!("Uploaded recording {} ({} bytes)", model.filename, model.size);
        return Ok(Json(model.into()));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Recording>>> {
    match RecordingsService::list_all(state.database.get_connection()).await {
        Ok(rows) => {
            info!("Retrieved {} recordings", rows.len());
            Ok(Json(rows.into_iter().map(Recording::from).collect()))
        }
        Err(e) => {
            error!("Failed to retrieve recordings: {}", e);
            Err(AppError::storage(e))
        }
    }
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Recording>> {
    // Non-numeric ids cannot match a row
    let id: i64 = id.parse().map_err(|_| AppError::NotFound)?;

    match RecordingsService::get_by_id(state.database.get_connection(), id).await {
        Ok(Some(row)) => Ok(Json(row.into())),
        Ok(None) => Err(AppError::NotFound),
        Err(e) => {
            error!("Failed to retrieve recording {}: {}", id, e);
            Err(AppError::storage(e))
        }
    }
}
