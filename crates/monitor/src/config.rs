//! Monitor configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `POSTURE_*` environment variables (`__` separates sections,
//! e.g. `POSTURE_POSTURE__ANGLE_THRESHOLD=155`).

use std::net::SocketAddr;
use std::path::Path;

use camera_capture::CameraConfig;
use config::{Config, Environment, File};
use posture::PostureConfig;
use recording::RecordingConfig;
use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "posture-monitor.toml";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub posture: PostureConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
    /// User that recorded sessions are attributed to
    pub user_id: String,
    /// Seconds between status log lines
    pub status_interval_secs: u64,
    /// Serve Prometheus metrics on this address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            posture: PostureConfig::default(),
            recording: RecordingConfig::default(),
            logging: LoggingConfig::default(),
            user_id: "default".to_string(),
            status_interval_secs: 5,
            metrics_addr: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; without one, `posture-monitor.toml` is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("POSTURE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<MonitorConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(MonitorError::InvalidConfig(
                "camera resolution must be non-zero".into(),
            ));
        }
        if !(0.0..=180.0).contains(&self.posture.angle_threshold) {
            return Err(MonitorError::InvalidConfig(format!(
                "posture.angle_threshold {} is outside 0..=180",
                self.posture.angle_threshold
            )));
        }
        if !self.posture.distance_threshold.is_finite() || self.posture.distance_threshold <= 0.0 {
            return Err(MonitorError::InvalidConfig(
                "posture.distance_threshold must be positive".into(),
            ));
        }
        if self.user_id.is_empty() {
            return Err(MonitorError::InvalidConfig("user_id must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.fps, 20);
        assert_eq!(config.posture.debounce_frames, 30);
        assert_eq!(config.recording.file_prefix, "posture_recording");
        assert!(config.metrics_addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "user_id = \"alice\"\n\n[posture]\nangle_threshold = 155.0\n\n[recording]\noutput_dir = \"/tmp/clips\""
        )
        .unwrap();

        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.posture.angle_threshold, 155.0);
        assert_eq!(config.posture.debounce_frames, 30);
        assert_eq!(config.recording.output_dir, Path::new("/tmp/clips"));
        assert_eq!(config.camera.height, 480);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = MonitorConfig::load(Some(Path::new("/no/such/posture-monitor.toml")));
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = MonitorConfig::default();
        config.posture.angle_threshold = 200.0;
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig(_))));

        let mut config = MonitorConfig::default();
        config.posture.distance_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
