//! Live status and control responses

use serde::{Deserialize, Serialize};

/// Point-in-time view of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Last computed neck angle (degrees), 0 before the first sample
    pub angle: f32,
    /// Last computed face distance, 0 before the first sample
    pub face_distance: f32,
    /// Whether the last sample was bad (angle or distance out of range)
    pub is_bad_posture: bool,
    /// Sustained (debounced) bad posture, as drawn by the warning banner
    pub is_currently_bad: bool,
    pub bad_posture_count: u32,
    pub is_recording: bool,
    /// Whole seconds since recording started
    pub recording_time: Option<u64>,
}

/// Outcome of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlStatus {
    #[serde(rename = "recording started")]
    RecordingStarted,
    #[serde(rename = "already recording")]
    AlreadyRecording,
    #[serde(rename = "recording stopped")]
    RecordingStopped,
    #[serde(rename = "not recording")]
    NotRecording,
    #[serde(rename = "recording failed")]
    RecordingFailed,
}

impl ControlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlStatus::RecordingStarted => "recording started",
            ControlStatus::AlreadyRecording => "already recording",
            ControlStatus::RecordingStopped => "recording stopped",
            ControlStatus::NotRecording => "not recording",
            ControlStatus::RecordingFailed => "recording failed",
        }
    }
}

impl std::fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to start/stop recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ControlStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlResponse {
    pub fn new(status: ControlStatus) -> Self {
        Self {
            status,
            video_id: None,
            message: None,
        }
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ControlStatus::RecordingFailed,
            video_id: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_response_json() {
        let started = ControlResponse::new(ControlStatus::RecordingStarted)
            .with_video_id("posture_recording_20240101_120000.mjpeg");
        let json = serde_json::to_value(&started).unwrap();
        assert_eq!(json["status"], "recording started");
        assert_eq!(json["video_id"], "posture_recording_20240101_120000.mjpeg");
        assert!(json.get("message").is_none());

        let idle = serde_json::to_string(&ControlResponse::new(ControlStatus::NotRecording)).unwrap();
        assert_eq!(idle, r#"{"status":"not recording"}"#);
    }

    #[test]
    fn test_status_strings_match_serde_names() {
        for status in [
            ControlStatus::RecordingStarted,
            ControlStatus::AlreadyRecording,
            ControlStatus::RecordingStopped,
            ControlStatus::NotRecording,
            ControlStatus::RecordingFailed,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }

    #[test]
    fn test_status_snapshot_json_shape() {
        let json = serde_json::to_value(StatusSnapshot::default()).unwrap();
        assert_eq!(json["recording_time"], serde_json::Value::Null);
        assert_eq!(json["is_recording"], false);
        assert_eq!(json["bad_posture_count"], 0);
        assert_eq!(json["is_bad_posture"], false);
        assert_eq!(json["is_currently_bad"], false);
    }
}
