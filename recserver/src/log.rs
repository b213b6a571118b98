use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, info, warn};

/// Requests slower than this are logged at warn
const SLOW_MS: u128 = 500;

/// Log method, uri, status and latency of every request.
///
/// Bodies pass through untouched: uploads and blob downloads are streamed.
pub async fn print_request_response(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let res = next.run(req).await;
    let elapsed = start.elapsed().as_millis();
    let status = res.status().as_u16();

    if res.status().is_success() || res.status().is_redirection() {
        if elapsed > SLOW_MS {
            warn!("[{} {}] [{}] {}ms", method, uri, status, elapsed);
        } else {
            info!("[{} {}] [{}] {}ms", method, uri, status, elapsed);
        }
    } else {
        error!("[{} {}] [{}] {}ms", method, uri, status, elapsed);
    }

    res
}
