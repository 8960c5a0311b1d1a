//! Geometric posture features: neck angle and face distance
//!
//! Neck angle is measured at the left shoulder between the shoulder→ear and
//! shoulder→hip vectors: cos(θ) = (v1 · v2) / (|v1| × |v2|). An upright
//! sitter gives ~180°, a forward head ("tech neck") closes the angle.
//!
//! Face distance is the planar distance between both ears in normalized
//! image units; the closer the face is to the camera, the larger it gets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmarks::{BodyPart, Keypoint, PoseLandmarks};

/// Vectors shorter than this are treated as overlapping landmarks
const MIN_VECTOR_LENGTH: f32 = 1e-6;

/// Reasons a frame yields no posture sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("Required landmark missing: {0:?}")]
    MissingLandmark(BodyPart),

    #[error("Degenerate landmark geometry")]
    Degenerate,
}

/// Classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Neck angle below this is bad (degrees)
    pub angle_deg: f32,
    /// Face distance above this is too close
    pub distance: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            angle_deg: 150.0,
            distance: 0.5,
        }
    }
}

/// Per-frame posture measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureSample {
    /// Ear-shoulder-hip angle in degrees, within [0, 180]
    pub neck_angle: f32,
    /// Inter-ear distance (normalized units)
    pub face_distance: f32,
    /// Instantaneous (pre-debounce) classification
    pub is_bad: bool,
    /// Neck angle under threshold
    pub bad_angle: bool,
    /// Face distance over threshold
    pub too_close: bool,
}

impl PostureSample {
    /// Classify raw measurements against thresholds
    pub fn classify(neck_angle: f32, face_distance: f32, thresholds: &Thresholds) -> Self {
        let bad_angle = neck_angle < thresholds.angle_deg;
        let too_close = face_distance > thresholds.distance;
        Self {
            neck_angle,
            face_distance,
            is_bad: bad_angle || too_close,
            bad_angle,
            too_close,
        }
    }
}

/// Compute the posture sample for one set of landmarks
pub fn compute_features(
    landmarks: &PoseLandmarks,
    thresholds: &Thresholds,
) -> Result<PostureSample, FeatureError> {
    let ear = require(landmarks, BodyPart::LeftEar)?;
    let shoulder = require(landmarks, BodyPart::LeftShoulder)?;
    let hip = require(landmarks, BodyPart::LeftHip)?;
    let right_ear = require(landmarks, BodyPart::RightEar)?;

    let neck_angle = vertex_angle(shoulder.xy(), ear.xy(), hip.xy())?;
    let face_distance = planar_distance(ear.xy(), right_ear.xy())?;

    Ok(PostureSample::classify(neck_angle, face_distance, thresholds))
}

fn require(landmarks: &PoseLandmarks, part: BodyPart) -> Result<&Keypoint, FeatureError> {
    landmarks
        .get(part)
        .ok_or(FeatureError::MissingLandmark(part))
}

/// Angle at `vertex` between vertex→a and vertex→b, in degrees
pub fn vertex_angle(
    vertex: (f32, f32),
    a: (f32, f32),
    b: (f32, f32),
) -> Result<f32, FeatureError> {
    let v1 = (a.0 - vertex.0, a.1 - vertex.1);
    let v2 = (b.0 - vertex.0, b.1 - vertex.1);

    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    // NaN fails both comparisons, so check finiteness explicitly
    if !mag1.is_finite() || !mag2.is_finite() {
        return Err(FeatureError::Degenerate);
    }
    if mag1 < MIN_VECTOR_LENGTH || mag2 < MIN_VECTOR_LENGTH {
        return Err(FeatureError::Degenerate);
    }

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);

    Ok(cos_angle.acos().to_degrees())
}

/// Euclidean distance in the image plane
pub fn planar_distance(a: (f32, f32), b: (f32, f32)) -> Result<f32, FeatureError> {
    let distance = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    if distance.is_finite() {
        Ok(distance)
    } else {
        Err(FeatureError::Degenerate)
    }
}
