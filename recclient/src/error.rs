use thiserror::Error;

use crate::session::Phase;

/// Failures acquiring or encoding capture streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("screen capture is not supported on this platform: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    Denied(String),

    #[error("encoder error: {0}")]
    Encoder(String),
}

/// Failures talking to the recordings API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("not allowed while {0:?}")]
    Busy(Phase),

    #[error("No recording to upload.")]
    NoRecording,

    #[error("an upload is already in flight")]
    UploadInFlight,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
