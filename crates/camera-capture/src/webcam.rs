//! Live webcam capture through OpenCV

use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::time::Instant;
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

/// Webcam source backed by `cv::VideoCapture`
pub struct WebcamSource {
    capture: Option<VideoCapture>,
    started: Instant,
    sequence: u32,
}

impl WebcamSource {
    /// Open the camera at `config.device_index` and request the configured resolution
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let mut capture = VideoCapture::new(config.device_index, videoio::CAP_ANY)
            .map_err(|e| CameraError::Open(e.to_string()))?;

        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::Open(e.to_string()))?;
        if !opened {
            return Err(CameraError::Open(format!(
                "device {} not available",
                config.device_index
            )));
        }

        capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)
            .map_err(|e| CameraError::Open(e.to_string()))?;
        capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)
            .map_err(|e| CameraError::Open(e.to_string()))?;

        info!(
            "Opened webcam {} at {}x{}",
            config.device_index, config.width, config.height
        );

        Ok(Self {
            capture: Some(capture),
            started: Instant::now(),
            sequence: 0,
        })
    }
}

impl FrameSource for WebcamSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let capture = self.capture.as_mut().ok_or(CameraError::Closed)?;

        let mut bgr = Mat::default();
        let grabbed = capture
            .read(&mut bgr)
            .map_err(|e| CameraError::Stream(e.to_string()))?;
        if !grabbed || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| CameraError::Decode(e.to_string()))?;

        let data = rgb
            .data_bytes()
            .map_err(|e| CameraError::Decode(e.to_string()))?
            .to_vec();

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        Ok(Some(VideoFrame::new(
            data,
            rgb.cols() as u32,
            rgb.rows() as u32,
            self.started.elapsed().as_nanos() as u64,
            sequence,
        )))
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                debug!("Webcam release failed: {}", e);
            }
            info!("Webcam released");
        }
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.close();
    }
}
