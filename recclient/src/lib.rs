//! Client side of screenrec.
//!
//! - [`capture`]: platform capture behind traits, plus ffmpeg and synthetic backends
//! - [`session`]: the record / preview / download / upload state machine
//! - [`client`]: HTTP client for the recordings API
//! - [`gallery`]: client-side pagination of uploaded recordings

pub mod capture;
pub mod client;
pub mod error;
pub mod format;
pub mod gallery;
pub mod preview;
pub mod session;

pub use client::ApiClient;
pub use error::{ApiError, CaptureError, SessionError};
pub use gallery::Gallery;
pub use session::{Phase, Session, SessionUpdate};
