//! A capture backend that needs no devices.
//!
//! Emits `chunk-<n>;` every timeslice. Useful for dry runs of the whole
//! record/upload pipeline and for tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant};

use super::{
    CaptureBackend, MediaRecorder, MediaStream, RecorderEvent, RecorderState, Track, TrackKind,
    TrackSource, DEFAULT_TYPE, PREFERRED_TYPES,
};
use crate::error::CaptureError;

#[derive(Clone)]
pub struct SyntheticBackend {
    display: bool,
    deny_display: bool,
    deny_microphone: bool,
    screen_audio: bool,
    types: Vec<String>,
    issued: Arc<Mutex<Vec<Track>>>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            display: true,
            deny_display: false,
            deny_microphone: false,
            screen_audio: true,
            types: PREFERRED_TYPES.iter().map(|s| s.to_string()).collect(),
            issued: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pretend the platform has no screen capture
    pub fn without_display(mut self) -> Self {
        self.display = false;
        self
    }

    pub fn deny_display(mut self) -> Self {
        self.deny_display = true;
        self
    }

    pub fn deny_microphone(mut self) -> Self {
        self.deny_microphone = true;
        self
    }

    pub fn without_screen_audio(mut self) -> Self {
        self.screen_audio = false;
        self
    }

    pub fn supported_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Every track handed out so far
    pub fn issued_tracks(&self) -> Vec<Track> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn issue(&self, kind: TrackKind, label: &str) -> Track {
        let track = Track::new(
            kind,
            label,
            TrackSource {
                format: "synthetic".to_string(),
                device: label.to_string(),
            },
        );
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(track.clone());
        track
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    fn supports_display_capture(&self) -> bool {
        self.display
    }

    async fn display_media(&self) -> Result<MediaStream, CaptureError> {
        if !self.display {
            return Err(CaptureError::Unavailable("no display".to_string()));
        }
        if self.deny_display {
            return Err(CaptureError::Denied("Permission denied by user".to_string()));
        }
        let mut stream = MediaStream::new();
        stream.add_track(self.issue(TrackKind::Video, "synthetic-screen"));
        if self.screen_audio {
            stream.add_track(self.issue(TrackKind::Audio, "synthetic-screen-audio"));
        }
        Ok(stream)
    }

    async fn user_audio(&self) -> Result<MediaStream, CaptureError> {
        if self.deny_microphone {
            return Err(CaptureError::Denied("microphone blocked".to_string()));
        }
        let mut stream = MediaStream::new();
        stream.add_track(self.issue(TrackKind::Audio, "synthetic-microphone"));
        Ok(stream)
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        self.types.iter().any(|t| t == mime)
    }

    fn recorder(
        &self,
        stream: &MediaStream,
        mime: Option<&str>,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        if stream.video_tracks().next().is_none() {
            return Err(CaptureError::Encoder("stream has no video track".to_string()));
        }
        Ok(Box::new(SyntheticRecorder {
            mime: mime.unwrap_or(DEFAULT_TYPE).to_string(),
            stop: None,
        }))
    }
}

pub struct SyntheticRecorder {
    mime: String,
    stop: Option<oneshot::Sender<()>>,
}

#[async_trait]
impl MediaRecorder for SyntheticRecorder {
    fn mime_type(&self) -> String {
        self.mime.clone()
    }

    fn state(&self) -> RecorderState {
        if self.stop.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Inactive
        }
    }

    async fn start(
        &mut self,
        timeslice: Duration,
        events: mpsc::UnboundedSender<RecorderEvent>,
    ) -> Result<(), CaptureError> {
        if self.stop.is_some() {
            return Err(CaptureError::Encoder("recorder already started".to_string()));
        }
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop = Some(stop_tx);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
            let mut n = 0u64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let chunk = Bytes::from(format!("chunk-{n};"));
                        n += 1;
                        if events.send(RecorderEvent::Data(chunk)).is_err() {
                            break;
                        }
                    }
                    _ = &mut stop_rx => {
                        let _ = events.send(RecorderEvent::Stop);
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        Ok(())
    }
}
