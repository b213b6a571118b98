use std::future::Future;

use axum::{extract::DefaultBodyLimit, extract::Request, Router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, info_span};

use storage::BlobStore;

use crate::config::Config;
use crate::service::database::DatabaseService;

pub mod config;
mod entity;
mod error;
mod log;
mod migration;
mod result;
mod route;
mod service;

pub async fn serve<F>(cfg: Config, listener: TcpListener, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Server listening on {}", listener.local_addr()?);

    let database = DatabaseService::new(&cfg.database).await?;
    let blobs = BlobStore::open(&cfg.storage).await?;

    let app_state = AppState {
        config: cfg.clone(),
        database,
        blobs,
    };

    let app = router(app_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .unwrap_or_else(|e| error!("Application error: {e}"));
    Ok(())
}

fn router(state: AppState) -> Router {
    let blobs = route::blob::route(&state.config.storage.root);
    let body_limit = match state.config.upload.max_size {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .merge(route::recording::route())
        .merge(blobs)
        .layer(body_limit)
        .layer(if state.config.http.cors {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        })
        .with_state(state)
        .layer(axum::middleware::from_fn(log::print_request_response))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let span = info_span!(
                    "http_request",
                    uri = ?request.uri(),
                    method = ?request.method(),
                    span_id = tracing::field::Empty,
                );
                span.record(
                    "span_id",
                    span.id().unwrap_or(tracing::Id::from_u64(42)).into_u64(),
                );
                span
            }),
        )
}

#[derive(Clone)]
struct AppState {
    config: Config,
    database: DatabaseService,
    blobs: BlobStore,
}
