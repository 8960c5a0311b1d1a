//! Posture analysis configuration

use serde::{Deserialize, Serialize};

use crate::features::Thresholds;

/// Posture analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Neck angle below which posture is bad (degrees)
    pub angle_threshold: f32,

    /// Inter-ear distance above which the face is too close (normalized units)
    pub distance_threshold: f32,

    /// Consecutive bad frames before an incident is counted (~1.5s at 20fps)
    pub debounce_frames: u32,

    /// Pose presence confidence required for a detection
    pub min_detection_confidence: f32,

    /// Keypoints below this visibility are reported as absent
    pub min_landmark_visibility: f32,

    /// Square model input resolution (pixels)
    pub input_size: u32,

    /// Landmark model path
    pub model_path: Option<String>,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            angle_threshold: 150.0,
            distance_threshold: 0.5,
            debounce_frames: 30,
            min_detection_confidence: 0.5,
            min_landmark_visibility: 0.0,
            input_size: 256,
            model_path: None,
        }
    }
}

impl PostureConfig {
    /// Create strict config (flags smaller deviations sooner)
    pub fn strict() -> Self {
        Self {
            angle_threshold: 160.0,
            distance_threshold: 0.4,
            debounce_frames: 20,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerates more slouching)
    pub fn lenient() -> Self {
        Self {
            angle_threshold: 140.0,
            distance_threshold: 0.6,
            debounce_frames: 60,
            ..Default::default()
        }
    }

    /// Classification thresholds for the feature extractor
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            angle_deg: self.angle_threshold,
            distance: self.distance_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PostureConfig::default();
        assert_eq!(config.angle_threshold, 150.0);
        assert_eq!(config.distance_threshold, 0.5);
        assert_eq!(config.debounce_frames, 30);
    }

    #[test]
    fn test_presets_order() {
        let strict = PostureConfig::strict();
        let lenient = PostureConfig::lenient();
        assert!(strict.angle_threshold > lenient.angle_threshold);
        assert!(strict.debounce_frames < lenient.debounce_frames);
    }
}
