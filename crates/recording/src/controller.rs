//! Recording controller (Idle -> Recording -> Idle)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use camera_capture::VideoFrame;
use chrono::{DateTime, Local};
use metrics::counter;
use tracing::{info, warn};

use crate::sink::{OpenedSink, SinkFactory, VideoSink};
use crate::RecordingError;

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { video_id: String, path: PathBuf },
    AlreadyRecording,
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Stopped(FinishedRecording),
    NotRecording,
}

/// Summary of a completed recording
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedRecording {
    pub video_id: String,
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub frames_written: u64,
    pub write_errors: u64,
}

/// The active recording
struct RecordingSession {
    video_id: String,
    path: PathBuf,
    started_at: DateTime<Local>,
    started: Instant,
    sink: Box<dyn VideoSink>,
    frames_written: u64,
    write_errors: u64,
}

/// Owns at most one recording session at a time
pub struct RecordingController {
    factory: Box<dyn SinkFactory>,
    file_prefix: String,
    session: Option<RecordingSession>,
}

impl RecordingController {
    pub fn new(factory: Box<dyn SinkFactory>, file_prefix: impl Into<String>) -> Self {
        Self {
            factory,
            file_prefix: file_prefix.into(),
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Time since the active recording started
    pub fn elapsed(&self) -> Option<Duration> {
        self.session.as_ref().map(|s| s.started.elapsed())
    }

    /// Open a new sink and start recording.
    ///
    /// On `SinkUnavailable` the controller stays idle.
    pub fn start(&mut self) -> Result<StartOutcome, RecordingError> {
        if self.session.is_some() {
            return Ok(StartOutcome::AlreadyRecording);
        }

        let started_at = Local::now();
        let stem = format!("{}_{}", self.file_prefix, started_at.format("%Y%m%d_%H%M%S"));

        let OpenedSink {
            sink,
            video_id,
            path,
        } = self.factory.open(&stem)?;

        info!("Recording started: {}", video_id);
        self.session = Some(RecordingSession {
            video_id: video_id.clone(),
            path: path.clone(),
            started_at,
            started: Instant::now(),
            sink,
            frames_written: 0,
            write_errors: 0,
        });

        Ok(StartOutcome::Started { video_id, path })
    }

    /// Finish the sink and go idle
    pub fn stop(&mut self) -> StopOutcome {
        let Some(mut session) = self.session.take() else {
            return StopOutcome::NotRecording;
        };

        if let Err(e) = session.sink.finish() {
            warn!("Failed to finish recording {}: {}", session.video_id, e);
        }

        let duration = session.started.elapsed();
        info!(
            "Recording stopped: {} ({} frames, {:.1}s)",
            session.video_id,
            session.frames_written,
            duration.as_secs_f64()
        );

        StopOutcome::Stopped(FinishedRecording {
            video_id: session.video_id,
            path: session.path,
            started_at: session.started_at,
            duration,
            frames_written: session.frames_written,
            write_errors: session.write_errors,
        })
    }

    /// Append a frame when recording. Sink errors are logged, never returned.
    pub fn feed(&mut self, frame: &VideoFrame) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.sink.write_frame(frame) {
            Ok(()) => {
                session.frames_written += 1;
                counter!("recording_frames_total").increment(1);
            }
            Err(e) => {
                session.write_errors += 1;
                counter!("recording_write_errors_total").increment(1);
                warn!("Dropped frame {} from {}: {}", frame.sequence, session.video_id, e);
            }
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}
