//! Body landmark detection

use camera_capture::frame::VideoFrame;
use image::{imageops, ImageBuffer, Rgb};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, error, info, warn};

use crate::landmarks::{BodyPart, Keypoint, PoseLandmarks, LANDMARK_COUNT};
use crate::{PostureConfig, PostureError};

/// Source of body landmarks for a frame.
///
/// `Ok(None)` means nobody was detected, which is a normal outcome.
pub trait LandmarkProvider: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<PoseLandmarks>, PostureError>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<PoseLandmarks>, PostureError> {
        (**self).detect(frame)
    }
}

/// Memory layout of the model's image input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// 1x3xHxW
    Nchw,
    /// 1xHxWx3
    Nhwc,
}

/// Layout and square input size implied by a model input shape.
///
/// The channel axis is whichever of dims 1 and 3 equals 3. Dynamic (`-1`)
/// or non-4D shapes fall back to NCHW with no size.
pub fn input_layout(shape: &[i64]) -> (InputLayout, Option<u32>) {
    let size = |dim: i64| u32::try_from(dim).ok().filter(|&d| d > 0);
    match shape {
        [_, 3, h, _] => (InputLayout::Nchw, size(*h)),
        [_, h, _, 3] => (InputLayout::Nhwc, size(*h)),
        _ => (InputLayout::Nchw, None),
    }
}

/// Pose landmark detector running a BlazePose-style ONNX model
pub struct OnnxPoseDetector {
    session: Option<Session>,
    output_names: Vec<String>,
    layout: InputLayout,
    input_size: u32,
    min_detection_confidence: f32,
    min_landmark_visibility: f32,
}

impl OnnxPoseDetector {
    pub fn new(config: &PostureConfig) -> Result<Self, PostureError> {
        let session = if let Some(path) = &config.model_path {
            info!("Loading pose landmark model from {}", path);
            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.commit_from_file(path))
                .map_err(|e| {
                    error!("Failed to load pose model: {}", e);
                    PostureError::ModelLoad(e.to_string())
                })?;
            Some(session)
        } else {
            warn!("No pose model path configured. Every frame will report no detection.");
            None
        };

        let output_names = session
            .as_ref()
            .map(|s| s.outputs.iter().map(|o| o.name.clone()).collect())
            .unwrap_or_default();

        let shape: Vec<i64> = session
            .as_ref()
            .and_then(|s| s.inputs.first())
            .and_then(|input| input.input_type.tensor_shape())
            .map(|shape| shape.iter().copied().collect())
            .unwrap_or_default();
        let (layout, model_size) = input_layout(&shape);
        let input_size = model_size.unwrap_or(config.input_size).max(1);
        if session.is_some() {
            info!("Model input {:?} -> {:?} {}x{}", shape, layout, input_size, input_size);
        }

        Ok(Self {
            session,
            output_names,
            layout,
            input_size,
            min_detection_confidence: config.min_detection_confidence,
            min_landmark_visibility: config.min_landmark_visibility,
        })
    }

    /// Whether a model is loaded
    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Resize to the model input and lay out in the model's layout, in 0..1
    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, PostureError> {
        let img = ImageBuffer::<Rgb<u8>, _>::from_raw(frame.width, frame.height, frame.data.as_slice())
            .ok_or_else(|| PostureError::ImageProcessing("Failed to create image buffer".into()))?;

        let size = self.input_size;
        let resized = imageops::resize(&img, size, size, imageops::FilterType::Triangle);

        let side = size as usize;
        let mut input = match self.layout {
            InputLayout::Nchw => Array4::<f32>::zeros((1, 3, side, side)),
            InputLayout::Nhwc => Array4::<f32>::zeros((1, side, side, 3)),
        };
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                match self.layout {
                    InputLayout::Nchw => input[[0, c, y, x]] = value,
                    InputLayout::Nhwc => input[[0, y, x, c]] = value,
                }
            }
        }
        Ok(input)
    }
}

impl LandmarkProvider for OnnxPoseDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<PoseLandmarks>, PostureError> {
        if self.session.is_none() {
            return Ok(None);
        }

        let input = self.preprocess(frame)?;
        let tensor = Tensor::from_array(input).map_err(|e| PostureError::Inference(e.to_string()))?;

        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| PostureError::Inference(e.to_string()))?;

        // Optional second output: pose presence score
        if let Some(flag) = self.output_names.get(1).and_then(|name| outputs.get(name.as_str())) {
            let (_, data) = flag
                .try_extract_tensor::<f32>()
                .map_err(|e| PostureError::Inference(e.to_string()))?;
            let presence = data.first().copied().map(to_probability).unwrap_or(0.0);
            if presence < self.min_detection_confidence {
                debug!("Pose presence {:.2} below threshold", presence);
                return Ok(None);
            }
        }

        let landmark_output = self
            .output_names
            .first()
            .and_then(|name| outputs.get(name.as_str()))
            .ok_or_else(|| PostureError::Inference("Model returned no outputs".into()))?;
        let (_, data) = landmark_output
            .try_extract_tensor::<f32>()
            .map_err(|e| PostureError::Inference(e.to_string()))?;

        Ok(parse_landmarks(
            data,
            self.input_size as f32,
            self.min_landmark_visibility,
        ))
    }
}

/// Decode a flat landmark tensor.
///
/// Accepts 5 values per landmark (x, y, z, visibility, presence), 4 or 3.
/// Coordinates in model input pixels are normalized by `input_size`;
/// coordinates that already look normalized are kept as is. Visibility
/// logits are squashed with a sigmoid. Returns `None` when the tensor is
/// too short or every keypoint is filtered out.
pub fn parse_landmarks(data: &[f32], input_size: f32, min_visibility: f32) -> Option<PoseLandmarks> {
    let stride = [5usize, 4, 3]
        .into_iter()
        .find(|&s| data.len() >= LANDMARK_COUNT * s && data.len() % s == 0)?;

    let max_coord = (0..LANDMARK_COUNT)
        .flat_map(|i| [data[i * stride], data[i * stride + 1]])
        .filter(|v| v.is_finite())
        .fold(0.0f32, |acc, v| acc.max(v.abs()));
    let scale = if max_coord > 2.0 { input_size } else { 1.0 };

    let mut landmarks = PoseLandmarks::new();
    for (i, part) in BodyPart::ALL.iter().enumerate() {
        let base = i * stride;
        let visibility = if stride >= 4 {
            to_probability(data[base + 3])
        } else {
            1.0
        };
        let keypoint = Keypoint {
            x: data[base] / scale,
            y: data[base + 1] / scale,
            z: data[base + 2] / scale,
            visibility,
        };

        if keypoint.is_finite() && visibility >= min_visibility {
            landmarks.set(*part, keypoint);
        }
    }

    if landmarks.is_empty() {
        None
    } else {
        Some(landmarks)
    }
}

/// Values outside 0..1 are treated as logits
fn to_probability(value: f32) -> f32 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        1.0 / (1.0 + (-value).exp())
    }
}
