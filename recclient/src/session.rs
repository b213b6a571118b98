//! The record / preview / download / upload state machine.
//!
//! ```text
//! Idle -> Requesting -> Recording -> Stopped -> Idle
//!                                       \-> Uploading -> Idle
//!                                               \-> Stopped (on failure)
//! ```
//!
//! Recorder output and the elapsed-time ticker are both delivered through
//! [`Session::next_event`]; only the ticker can stop the recording on its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use api::recording::Recording;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, Interval};
use tracing::{debug, info, warn};

use crate::capture::{
    select_mime_type, CaptureBackend, MediaRecorder, MediaStream, RecorderEvent,
};
use crate::client::ApiClient;
use crate::error::{CaptureError, SessionError};
use crate::format::timestamp_name;
use crate::gallery::Gallery;
use crate::preview::{Blob, PreviewHandle, PreviewRegistry};

/// Hard ceiling of one recording, in seconds
pub const MAX_SECONDS: u32 = 180;

/// Encoder chunk cadence and ticker period
pub const TIMESLICE: Duration = Duration::from_secs(1);

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub const UNSUPPORTED_MESSAGE: &str = "Screen capture is not supported on this platform.";
pub const UPLOAD_OK_MESSAGE: &str = "Upload successful";
pub const UPLOAD_CANCELLED_MESSAGE: &str = "Upload failed: cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
    Recording,
    Stopped,
    Uploading,
}

/// Result of a finished recording
#[derive(Debug, Clone)]
pub struct Recorded {
    pub blob: Blob,
    pub preview: PreviewHandle,
}

enum SessionState {
    Idle,
    Requesting,
    Recording,
    Stopped(Recorded),
    Uploading(Recorded),
}

impl SessionState {
    fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::Requesting => Phase::Requesting,
            SessionState::Recording => Phase::Recording,
            SessionState::Stopped(_) => Phase::Stopped,
            SessionState::Uploading(_) => Phase::Uploading,
        }
    }
}

struct ActiveCapture {
    recorder: Box<dyn MediaRecorder>,
    stream: MediaStream,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
    ticker: Interval,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    /// Reached the recording ceiling
    Limit,
    /// The recorder ended by itself, e.g. a source went away
    Recorder,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Bytes in the latest chunk
    Chunk(usize),
    /// Elapsed seconds so far
    Tick(u32),
    Stopped { elapsed: u32, reason: StopReason },
}

enum Wake {
    Recorder(Option<RecorderEvent>),
    Tick,
}

pub struct Session {
    backend: Arc<dyn CaptureBackend>,
    previews: PreviewRegistry,
    state: SessionState,
    status: Option<String>,
    elapsed: u32,
    limit: u32,
    chunks: Vec<Bytes>,
    active: Option<ActiveCapture>,
}

impl Session {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            previews: PreviewRegistry::new(),
            state: SessionState::Idle,
            status: None,
            elapsed: 0,
            limit: MAX_SECONDS,
            chunks: Vec::new(),
            active: None,
        }
    }

    pub fn with_limit(mut self, seconds: u32) -> Self {
        self.limit = seconds.max(1);
        self
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Last user-facing message, if any
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn recorded(&self) -> Option<&Recorded> {
        match &self.state {
            SessionState::Stopped(r) | SessionState::Uploading(r) => Some(r),
            _ => None,
        }
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session {:?} -> {:?}", self.state.phase(), next.phase());
        self.state = next;
    }

    /// Acquire screen (and microphone if allowed) and begin recording.
    ///
    /// Starting again from `Stopped` discards the previous recording.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Stopped(_) => self.discard(),
            _ => return Err(SessionError::Busy(self.phase())),
        }
        self.status = None;

        if !self.backend.supports_display_capture() {
            self.status = Some(UNSUPPORTED_MESSAGE.to_string());
            return Err(CaptureError::Unavailable(UNSUPPORTED_MESSAGE.to_string()).into());
        }

        self.transition(SessionState::Requesting);
        let screen = match self.backend.display_media().await {
            Ok(screen) => screen,
            Err(e) => return Err(self.fail_start(e, None)),
        };
        let microphone = match self.backend.user_audio().await {
            Ok(mic) => Some(mic),
            Err(e) => {
                warn!("Recording without microphone: {}", e);
                None
            }
        };
        let stream = MediaStream::combine(&screen, microphone.as_ref());

        let mime = select_mime_type(self.backend.as_ref());
        debug!("Selected recording type {:?}", mime);
        let mut recorder = match self.backend.recorder(&stream, mime) {
            Ok(recorder) => recorder,
            Err(e) => return Err(self.fail_start(e, Some(&stream))),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = recorder.start(TIMESLICE, tx).await {
            return Err(self.fail_start(e, Some(&stream)));
        }

        self.chunks.clear();
        self.elapsed = 0;
        self.active = Some(ActiveCapture {
            recorder,
            stream,
            events: rx,
            ticker: interval_at(Instant::now() + TIMESLICE, TIMESLICE),
        });
        self.transition(SessionState::Recording);
        Ok(())
    }

    fn fail_start(&mut self, e: CaptureError, stream: Option<&MediaStream>) -> SessionError {
        if let Some(stream) = stream {
            stream.stop_all();
        }
        self.status = Some(format!("Could not start recording: {}", e));
        self.transition(SessionState::Idle);
        e.into()
    }

    /// Wait for the next chunk or tick. `None` when not recording.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let active = self.active.as_mut()?;
        let wake = tokio::select! {
            event = active.events.recv() => Wake::Recorder(event),
            _ = active.ticker.tick() => Wake::Tick,
        };

        let update = match wake {
            Wake::Recorder(Some(RecorderEvent::Data(chunk))) => {
                let len = chunk.len();
                if len > 0 {
                    self.chunks.push(chunk);
                }
                SessionUpdate::Chunk(len)
            }
            Wake::Recorder(Some(RecorderEvent::Error(e))) => {
                warn!("Recorder error: {}", e);
                self.status = Some(format!("Recording stopped: {}", e));
                self.finish(StopReason::Error(e), true).await
            }
            Wake::Recorder(Some(RecorderEvent::Stop)) | Wake::Recorder(None) => {
                self.finish(StopReason::Recorder, false).await
            }
            Wake::Tick => {
                self.elapsed += 1;
                if self.elapsed >= self.limit {
                    info!("Recording reached {} seconds, stopping", self.limit);
                    self.finish(StopReason::Limit, true).await
                } else {
                    SessionUpdate::Tick(self.elapsed)
                }
            }
        };
        Some(update)
    }

    /// Drive the session until the recording stops by itself
    pub async fn run_until_stopped(&mut self) -> Option<SessionUpdate> {
        while let Some(update) = self.next_event().await {
            if let SessionUpdate::Stopped { .. } = update {
                return Some(update);
            }
        }
        None
    }

    /// Stop recording. A no-op when nothing is recording.
    pub async fn stop(&mut self) -> Option<SessionUpdate> {
        if self.active.is_none() {
            debug!("Stop ignored while {:?}", self.phase());
            return None;
        }
        Some(self.finish(StopReason::Manual, true).await)
    }

    async fn finish(&mut self, reason: StopReason, drain: bool) -> SessionUpdate {
        let elapsed = self.elapsed;
        let mut mime_type = crate::capture::DEFAULT_TYPE.to_string();

        // `active` is released only at the end so an interrupted stop can be retried
        if let Some(active) = self.active.as_mut() {
            if let Err(e) = active.recorder.stop().await {
                warn!("Failed to stop recorder: {}", e);
            }
            active.stream.stop_all();

            if drain {
                loop {
                    match timeout(DRAIN_TIMEOUT, active.events.recv()).await {
                        Ok(Some(RecorderEvent::Data(chunk))) => {
                            if !chunk.is_empty() {
                                self.chunks.push(chunk);
                            }
                        }
                        Ok(Some(RecorderEvent::Error(e))) => {
                            warn!("Recorder error while stopping: {}", e)
                        }
                        Ok(Some(RecorderEvent::Stop)) | Ok(None) => break,
                        Err(_) => {
                            warn!("Recorder did not flush within {:?}", DRAIN_TIMEOUT);
                            break;
                        }
                    }
                }
            }
            mime_type = active.recorder.mime_type();
        }
        self.active = None;

        let total = self.chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        let blob = Blob {
            data: data.freeze(),
            mime_type,
        };
        info!(
            "Recording stopped after {}s ({:?}): {} bytes",
            elapsed,
            reason,
            blob.len()
        );

        let preview = self.previews.create(blob.clone());
        self.elapsed = 0;
        self.transition(SessionState::Stopped(Recorded { blob, preview }));
        SessionUpdate::Stopped { elapsed, reason }
    }

    fn discard(&mut self) {
        if let SessionState::Stopped(recorded) = &self.state {
            self.previews.revoke(&recorded.preview);
        }
        self.transition(SessionState::Idle);
    }

    /// Drop the recording and its preview
    pub fn clear(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Stopped(_) => {
                self.discard();
                self.status = None;
                Ok(())
            }
            _ => Err(SessionError::Busy(self.phase())),
        }
    }

    /// Save the recording under `dir` with a timestamp-derived name
    pub async fn download(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let recorded = match &self.state {
            SessionState::Stopped(r) | SessionState::Uploading(r) => r,
            SessionState::Idle => return Err(SessionError::NoRecording),
            _ => return Err(SessionError::Busy(self.phase())),
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(timestamp_name(Utc::now()));
        tokio::fs::write(&path, &recorded.blob.data).await?;
        info!("Saved recording to {}", path.display());
        Ok(path)
    }

    /// Send the recording to the server and refresh `gallery` on success.
    ///
    /// On failure the recording is kept so the upload can be retried.
    pub async fn upload(
        &mut self,
        client: &ApiClient,
        gallery: &mut Gallery,
    ) -> Result<Recording, SessionError> {
        let recorded = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Stopped(r) if !r.blob.is_empty() => r,
            SessionState::Uploading(r) => {
                self.state = SessionState::Uploading(r);
                return Err(SessionError::UploadInFlight);
            }
            state @ (SessionState::Requesting | SessionState::Recording) => {
                self.state = state;
                return Err(SessionError::Busy(self.phase()));
            }
            state => {
                self.state = state;
                self.status = Some(SessionError::NoRecording.to_string());
                return Err(SessionError::NoRecording);
            }
        };

        self.status = None;
        self.state = SessionState::Stopped(recorded.clone());
        self.transition(SessionState::Uploading(recorded.clone()));

        let filename = timestamp_name(Utc::now());
        let result = {
            let mut guard = UploadGuard {
                session: self,
                recorded: Some(recorded.clone()),
            };
            let result = client
                .upload(
                    recorded.blob.data.clone(),
                    &filename,
                    &recorded.blob.mime_type,
                )
                .await;
            guard.recorded = None;
            result
        };

        match result {
            Ok(recording) => {
                self.previews.revoke(&recorded.preview);
                self.status = Some(UPLOAD_OK_MESSAGE.to_string());
                self.transition(SessionState::Idle);
                gallery.refresh(client).await;
                Ok(recording)
            }
            Err(e) => {
                warn!("Upload failed: {}", e);
                self.status = Some(format!("Upload failed: {}", e));
                self.transition(SessionState::Stopped(recorded));
                Err(e.into())
            }
        }
    }
}

/// Puts an upload whose future was dropped back into `Stopped`
struct UploadGuard<'a> {
    session: &'a mut Session,
    /// `None` once the request has completed either way
    recorded: Option<Recorded>,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        if let Some(recorded) = self.recorded.take() {
            warn!("Upload cancelled");
            self.session.status = Some(UPLOAD_CANCELLED_MESSAGE.to_string());
            self.session.transition(SessionState::Stopped(recorded));
        }
    }
}
