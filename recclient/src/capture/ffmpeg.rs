//! Capture through an `ffmpeg` child process.
//!
//! Screen comes from `x11grab`, audio from PulseAudio. The encoder writes
//! WebM to stdout and a reader task cuts it into timeslice chunks.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

use super::{
    CaptureBackend, MediaRecorder, MediaStream, RecorderEvent, RecorderState, Track, TrackKind,
    TrackSource, DEFAULT_TYPE,
};
use crate::error::CaptureError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const VP9: &str = "libvpx-vp9";
const VP8: &str = "libvpx";

#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    program: String,
    encoders: Vec<String>,
    display: Option<String>,
    framerate: u32,
    /// Pulse source carrying what the desktop plays, if any
    screen_audio: Option<String>,
    microphone: String,
}

impl FfmpegBackend {
    /// Look up `ffmpeg`, its VP8/VP9 encoders and the X display
    pub async fn probe() -> Self {
        let program = std::env::var("SCREENREC_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string());
        let encoders = list_encoders(&program).await;
        let x_display = if cfg!(target_os = "linux") {
            std::env::var("DISPLAY").ok().filter(|d| !d.is_empty())
        } else {
            None
        };
        info!(
            "ffmpeg capture: program={}, display={:?}, encoders={:?}",
            program, x_display, encoders
        );
        Self {
            program,
            encoders,
            display: x_display,
            framerate: 30,
            screen_audio: std::env::var("SCREENREC_SCREEN_AUDIO").ok(),
            microphone: "default".to_string(),
        }
    }

    pub fn with_screen_audio(mut self, source: impl Into<String>) -> Self {
        self.screen_audio = Some(source.into());
        self
    }

    pub fn with_microphone(mut self, source: impl Into<String>) -> Self {
        self.microphone = source.into();
        self
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.encoders.iter().any(|e| e == name)
    }

    /// Open `source` for a fraction of a second to see whether it is usable
    async fn check_source(&self, source: &TrackSource) -> Result<(), CaptureError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-f", source.format.as_str()])
            .args(["-i", source.device.as_str()])
            .args(["-t", "0.1", "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CaptureError::Unavailable(e.to_string())),
            Err(_) => {
                return Err(CaptureError::Denied(format!(
                    "{} did not respond",
                    source.device
                )))
            }
        };
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CaptureError::Denied(format!(
                "{} {}: {}",
                source.format,
                source.device,
                stderr.trim()
            )))
        }
    }
}

async fn list_encoders(program: &str) -> Vec<String> {
    let output = Command::new(program)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            parse_encoders(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            warn!("{} -encoders exited with {}", program, output.status);
            Vec::new()
        }
        Err(e) => {
            warn!("{} not usable: {}", program, e);
            Vec::new()
        }
    }
}

/// Encoder names out of `ffmpeg -encoders`, e.g. ` V....D libvpx-vp9  ...`
fn parse_encoders(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let flags = cols.next()?;
            let name = cols.next()?;
            let is_entry = flags.len() == 6
                && flags.chars().all(|c| c.is_ascii_uppercase() || c == '.')
                && name != "=";
            is_entry.then(|| name.to_string())
        })
        .collect()
}

#[async_trait]
impl CaptureBackend for FfmpegBackend {
    fn supports_display_capture(&self) -> bool {
        self.display.is_some() && (self.has_encoder(VP9) || self.has_encoder(VP8))
    }

    async fn display_media(&self) -> Result<MediaStream, CaptureError> {
        let Some(display) = self.display.clone() else {
            return Err(CaptureError::Unavailable("no X display".to_string()));
        };
        let screen = TrackSource {
            format: "x11grab".to_string(),
            device: display,
        };
        self.check_source(&screen).await?;

        let mut stream = MediaStream::new();
        stream.add_track(Track::new(TrackKind::Video, "screen", screen));

        if let Some(monitor) = &self.screen_audio {
            let source = TrackSource {
                format: "pulse".to_string(),
                device: monitor.clone(),
            };
            match self.check_source(&source).await {
                Ok(()) => stream.add_track(Track::new(TrackKind::Audio, "screen-audio", source)),
                Err(e) => debug!("No screen audio: {}", e),
            }
        }
        Ok(stream)
    }

    async fn user_audio(&self) -> Result<MediaStream, CaptureError> {
        let source = TrackSource {
            format: "pulse".to_string(),
            device: self.microphone.clone(),
        };
        self.check_source(&source).await?;
        let mut stream = MediaStream::new();
        stream.add_track(Track::new(TrackKind::Audio, "microphone", source));
        Ok(stream)
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        match mime {
            "video/webm;codecs=vp9" => self.has_encoder(VP9),
            "video/webm;codecs=vp8" => self.has_encoder(VP8),
            "video/webm" => self.has_encoder(VP9) || self.has_encoder(VP8),
            _ => false,
        }
    }

    fn recorder(
        &self,
        stream: &MediaStream,
        mime: Option<&str>,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        let mime = mime.unwrap_or(DEFAULT_TYPE);
        let codec = if mime.contains("vp8") || !self.has_encoder(VP9) {
            VP8
        } else {
            VP9
        };
        let args = encoder_args(stream, self.framerate, codec)?;
        Ok(Box::new(FfmpegRecorder {
            program: self.program.clone(),
            args,
            mime: mime.to_string(),
            child: None,
        }))
    }
}

/// Full ffmpeg argument list encoding `stream` to WebM on stdout
fn encoder_args(
    stream: &MediaStream,
    framerate: u32,
    codec: &str,
) -> Result<Vec<String>, CaptureError> {
    // stdin stays open: "q" on it ends the recording cleanly
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .map(String::from)
        .to_vec();

    let video = stream
        .video_tracks()
        .next()
        .ok_or_else(|| CaptureError::Encoder("stream has no video track".to_string()))?;
    args.extend(["-f".to_string(), video.source.format.clone()]);
    args.extend(["-framerate".to_string(), framerate.to_string()]);
    args.extend(["-i".to_string(), video.source.device.clone()]);

    let audio: Vec<&Track> = stream.audio_tracks().collect();
    for track in &audio {
        args.extend(["-f".to_string(), track.source.format.clone()]);
        args.extend(["-i".to_string(), track.source.device.clone()]);
    }

    args.extend(["-map".to_string(), "0:v".to_string()]);
    match audio.len() {
        0 => {}
        1 => args.extend(["-map".to_string(), "1:a".to_string()]),
        n => {
            let inputs: String = (1..=n).map(|i| format!("[{i}:a]")).collect();
            args.extend([
                "-filter_complex".to_string(),
                format!("{inputs}amix=inputs={n}[aout]"),
                "-map".to_string(),
                "[aout]".to_string(),
            ]);
        }
    }

    args.extend(
        ["-c:v", codec, "-deadline", "realtime", "-cpu-used", "8", "-b:v", "2M"].map(String::from),
    );
    if !audio.is_empty() {
        args.extend(["-c:a", "libopus", "-b:a", "128k"].map(String::from));
    }
    args.extend(["-f", "webm", "pipe:1"].map(String::from));
    Ok(args)
}

pub struct FfmpegRecorder {
    program: String,
    args: Vec<String>,
    mime: String,
    child: Option<Child>,
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    fn mime_type(&self) -> String {
        self.mime.clone()
    }

    fn state(&self) -> RecorderState {
        if self.child.is_some() {
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
        if self.child.is_some() {
            return Err(CaptureError::Encoder("recorder already started".to_string()));
        }
        debug!("Spawning {} {}", self.program, self.args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Encoder(format!("Failed to start ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Encoder("Failed to capture ffmpeg stdout".to_string()))?;
        tokio::spawn(pump(stdout, timeslice, events));
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                debug!("ffmpeg stdin closed early: {}", e);
            }
        }
        match timeout(STOP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!("ffmpeg exited with {}", status),
            Ok(Err(e)) => return Err(CaptureError::Encoder(e.to_string())),
            Err(_) => {
                warn!("ffmpeg did not finish in {:?}, killing", STOP_TIMEOUT);
                child
                    .kill()
                    .await
                    .map_err(|e| CaptureError::Encoder(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Forward encoder output one timeslice at a time, then `Stop` at EOF
async fn pump(
    mut stdout: ChildStdout,
    timeslice: Duration,
    events: mpsc::UnboundedSender<RecorderEvent>,
) {
    let mut buf = BytesMut::with_capacity(64 * 1024);
    let mut ticker = interval_at(Instant::now() + timeslice, timeslice);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = events.send(RecorderEvent::Data(buf.split().freeze()));
            }
            read = stdout.read_buf(&mut buf) => match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    let _ = events.send(RecorderEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }
    if !buf.is_empty() {
        let _ = events.send(RecorderEvent::Data(buf.split().freeze()));
    }
    let _ = events.send(RecorderEvent::Stop);
}
