//! Posture Analysis
//!
//! Per-frame posture assessment from body landmarks:
//! - Landmark detection (BlazePose-style ONNX model)
//! - Neck angle and face distance features
//! - Debounced bad-posture incident tracking

pub mod config;
pub mod detector;
pub mod features;
pub mod landmarks;
pub mod state;

pub use config::PostureConfig;
pub use detector::{input_layout, InputLayout, LandmarkProvider, OnnxPoseDetector};
pub use features::{compute_features, FeatureError, PostureSample, Thresholds};
pub use landmarks::{BodyPart, Keypoint, PoseLandmarks, SKELETON};
pub use state::{PostureState, PostureTracker};

use thiserror::Error;

/// Posture module error types
#[derive(Error, Debug)]
pub enum PostureError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
