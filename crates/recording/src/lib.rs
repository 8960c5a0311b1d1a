//! Recording
//!
//! Gates whether processed frames are appended to an output video and
//! tracks the duration of the active recording.

mod config;
mod controller;
#[cfg(feature = "webcam")]
mod opencv_sink;
mod sink;

pub use config::RecordingConfig;
pub use controller::{FinishedRecording, RecordingController, StartOutcome, StopOutcome};
#[cfg(feature = "webcam")]
pub use opencv_sink::{OpencvSinkFactory, OpencvVideoSink};
pub use sink::{MjpegFileSink, MjpegSinkFactory, OpenedSink, SinkFactory, VideoSink};

use thiserror::Error;

/// Recording errors
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Video sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Failed to write frame: {0}")]
    Write(String),

    #[error("Frame size {actual:?} does not match recording size {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Sink already finished")]
    Finished,
}
