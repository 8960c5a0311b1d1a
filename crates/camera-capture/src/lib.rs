//! Camera Capture Library for the Posture Monitor
//!
//! Provides the frame sources the monitoring pipeline pulls from:
//! - Image sequence replay (a directory of still frames)
//! - Webcam capture through OpenCV (`webcam` feature, 640x480 by default)

pub mod frame;
pub mod source;
#[cfg(feature = "webcam")]
pub mod webcam;

pub use frame::VideoFrame;
pub use source::ImageSequenceSource;
#[cfg(feature = "webcam")]
pub use webcam::WebcamSource;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Capture source closed")]
    Closed,
}

/// A pull-based source of raw frames.
///
/// `Ok(None)` signals exhaustion; the pipeline treats both exhaustion and
/// errors as end-of-stream.
pub trait FrameSource: Send {
    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;

    /// Release the underlying device. Must be safe to call more than once.
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index passed to the capture backend
    pub device_index: i32,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Nominal frame rate
    pub fps: u32,
    /// Replay still frames from this directory instead of a live camera
    pub frames_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            fps: 20,
            frames_dir: None,
        }
    }
}

impl CameraConfig {
    /// Nanoseconds between two frames at the nominal rate
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / self.fps.max(1) as u64
    }
}

/// Open the source described by `config`.
///
/// A configured `frames_dir` always wins; otherwise a live webcam is opened
/// when the crate is built with the `webcam` feature.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if let Some(dir) = &config.frames_dir {
        return Ok(Box::new(ImageSequenceSource::open(dir, config)?));
    }

    #[cfg(feature = "webcam")]
    {
        Ok(Box::new(WebcamSource::open(config)?))
    }

    #[cfg(not(feature = "webcam"))]
    {
        Err(CameraError::Open(
            "built without webcam support; set camera.frames_dir".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.frame_interval_ns(), 50_000_000);
    }

    #[test]
    fn test_zero_fps_does_not_divide_by_zero() {
        let config = CameraConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval_ns(), 1_000_000_000);
    }

    #[cfg(not(feature = "webcam"))]
    #[test]
    fn test_open_without_frames_dir_fails() {
        let result = open_source(&CameraConfig::default());
        assert!(matches!(result, Err(CameraError::Open(_))));
    }
}
