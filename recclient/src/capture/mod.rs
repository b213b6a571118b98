//! Capture sources and encoders
//!
//! A [`CaptureBackend`] hands out live [`MediaStream`]s (screen, microphone)
//! and builds a [`MediaRecorder`] that encodes a combined stream into chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::CaptureError;

pub mod ffmpeg;
pub mod synthetic;

/// Encodings to try, best first
pub const PREFERRED_TYPES: [&str; 3] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
];

/// Container type assumed when a recorder reports none
pub const DEFAULT_TYPE: &str = "video/webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Input format/device pair a backend opens a track with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSource {
    pub format: String,
    pub device: String,
}

/// One live capture source. Clones share the same liveness flag.
#[derive(Debug, Clone)]
pub struct Track {
    pub kind: TrackKind,
    pub label: String,
    pub source: TrackSource,
    live: Arc<AtomicBool>,
}

impl Track {
    pub fn new(kind: TrackKind, label: impl Into<String>, source: TrackSource) -> Self {
        Self {
            kind,
            label: label.into(),
            source,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Release the underlying device
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::debug!("Track stopped: {}", self.label);
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Track>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Screen video, then screen audio, then microphone audio
    pub fn combine(screen: &MediaStream, microphone: Option<&MediaStream>) -> MediaStream {
        let mut combined = MediaStream::new();
        screen.video_tracks().cloned().for_each(|t| combined.add_track(t));
        screen.audio_tracks().cloned().for_each(|t| combined.add_track(t));
        if let Some(mic) = microphone {
            mic.audio_tracks().cloned().for_each(|t| combined.add_track(t));
        }
        combined
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Delivered by a running recorder, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// One timeslice of encoded output, possibly empty
    Data(Bytes),
    /// The encoder hit an error and is going down
    Error(String),
    /// Last event of a recording; no more `Data` follows
    Stop,
}

#[async_trait]
pub trait MediaRecorder: Send {
    /// Output container/codec of the produced bytes
    fn mime_type(&self) -> String;

    fn state(&self) -> RecorderState;

    /// Begin encoding, emitting `Data` every `timeslice` and a final `Stop`
    async fn start(
        &mut self,
        timeslice: Duration,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> Result<(), CaptureError>;

    /// Flush and end the recording; a no-op when already inactive
    async fn stop(&mut self) -> Result<(), CaptureError>;
}

#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether this platform can capture the screen at all
    fn supports_display_capture(&self) -> bool;

    /// Screen video plus screen audio when the platform offers it
    async fn display_media(&self) -> Result<MediaStream, CaptureError>;

    /// Microphone audio
    async fn user_audio(&self) -> Result<MediaStream, CaptureError>;

    fn is_type_supported(&self, mime: &str) -> bool;

    /// Build a recorder over `stream`; `None` lets the backend pick its default
    fn recorder(
        &self,
        stream: &MediaStream,
        mime: Option<&str>,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError>;
}

/// First of [`PREFERRED_TYPES`] the backend can encode
pub fn select_mime_type(backend: &dyn CaptureBackend) -> Option<&'static str> {
    PREFERRED_TYPES
        .into_iter()
        .find(|mime| backend.is_type_supported(mime))
}
