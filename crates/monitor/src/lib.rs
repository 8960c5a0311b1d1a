//! Posture Monitor
//!
//! Wires the capture source, landmark provider, posture tracker and
//! recording controller into a single frame pipeline, and exposes live
//! status and recording control to the surrounding application.

pub mod config;
pub mod handle;
pub mod logging;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod status;

pub use config::{LoggingConfig, MonitorConfig};
pub use handle::MonitorHandle;
pub use pipeline::{FramePipeline, ProcessedFrame};
pub use status::{ControlResponse, ControlStatus, StatusSnapshot};

use camera_capture::CameraError;
use posture::PostureError;
use storage::StorageError;
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Posture model error: {0}")]
    Posture(#[from] PostureError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("Monitor loop is not running")]
    Stopped,

    #[error("Monitor loop panicked: {0}")]
    Task(String),
}
