//! Recording configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory recordings are written to (created on demand)
    pub output_dir: PathBuf,
    /// File name prefix, followed by the start timestamp
    pub file_prefix: String,
    /// JPEG quality for each recorded frame (1-100)
    pub jpeg_quality: u8,
    /// Start recording as soon as the monitor starts
    pub auto_start: bool,
    /// Posture samples kept per recording for the session statistics
    pub max_posture_records: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            file_prefix: "posture_recording".to_string(),
            jpeg_quality: 80,
            auto_start: false,
            max_posture_records: 36_000, // 30 minutes at 20fps
        }
    }
}
