//! AVI recordings through OpenCV's `VideoWriter`
//!
//! The container carries the capture frame rate, so recordings play back at
//! the speed they were captured.

use std::path::PathBuf;

use camera_capture::VideoFrame;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::VideoWriter,
};
use tracing::{debug, info, warn};

use crate::sink::create_unique;
use crate::{OpenedSink, RecordingConfig, RecordingError, SinkFactory, VideoSink};

fn write_error(e: opencv::Error) -> RecordingError {
    RecordingError::Write(e.to_string())
}

/// MJPG-in-AVI sink. The writer is opened on the first frame, whose size
/// fixes the size of the recording.
pub struct OpencvVideoSink {
    path: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
    frame_size: Option<(u32, u32)>,
    frames_written: u64,
    finished: bool,
}

impl OpencvVideoSink {
    pub fn new(path: PathBuf, fps: f64) -> Self {
        Self {
            path,
            fps,
            writer: None,
            frame_size: None,
            frames_written: 0,
            finished: false,
        }
    }

    fn open_writer(&self, width: u32, height: u32) -> Result<VideoWriter, RecordingError> {
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')
            .map_err(|e| RecordingError::SinkUnavailable(e.to_string()))?;
        let path = self.path.to_string_lossy();
        let writer = VideoWriter::new(
            &path,
            fourcc,
            self.fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .map_err(|e| RecordingError::SinkUnavailable(e.to_string()))?;

        let opened = writer
            .is_opened()
            .map_err(|e| RecordingError::SinkUnavailable(e.to_string()))?;
        if !opened {
            return Err(RecordingError::SinkUnavailable(format!(
                "{}: no MJPG writer available",
                path
            )));
        }

        debug!("Opened {}x{}@{} writer for {}", width, height, self.fps, path);
        Ok(writer)
    }

    fn release(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.release() {
                warn!("Failed to release video writer: {}", e);
            }
        }
    }
}

/// Packed RGB frame to an owned BGR `Mat`
fn to_bgr(frame: &VideoFrame) -> Result<Mat, RecordingError> {
    let flat = Mat::from_slice(&frame.data)
        .and_then(|m| m.try_clone())
        .map_err(write_error)?;
    let rgb = flat
        .reshape(3, frame.height as i32)
        .and_then(|m| m.try_clone())
        .map_err(write_error)?;

    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0).map_err(write_error)?;
    Ok(bgr)
}

impl VideoSink for OpencvVideoSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecordingError> {
        if self.finished {
            return Err(RecordingError::Finished);
        }

        let size = (frame.width, frame.height);
        match self.frame_size {
            Some(expected) if expected != size => {
                return Err(RecordingError::FrameSize {
                    expected,
                    actual: size,
                });
            }
            Some(_) => {}
            None => {
                self.writer = Some(self.open_writer(frame.width, frame.height)?);
                self.frame_size = Some(size);
            }
        }

        let bgr = to_bgr(frame)?;
        let writer = self.writer.as_mut().ok_or(RecordingError::Finished)?;
        writer.write(&bgr).map_err(write_error)?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        if self.finished {
            return Err(RecordingError::Finished);
        }
        self.finished = true;
        self.release();
        debug!("AVI sink finished after {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for OpencvVideoSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Creates `<output_dir>/<stem>.avi` files at a fixed frame rate
pub struct OpencvSinkFactory {
    output_dir: PathBuf,
    fps: f64,
}

impl OpencvSinkFactory {
    pub const EXTENSION: &'static str = "avi";

    pub fn new(output_dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            fps: f64::from(fps.max(1)),
        }
    }

    pub fn from_config(config: &RecordingConfig, fps: u32) -> Self {
        Self::new(config.output_dir.clone(), fps)
    }
}

impl SinkFactory for OpencvSinkFactory {
    fn open(&mut self, stem: &str) -> Result<OpenedSink, RecordingError> {
        // Reserve the name; the writer replaces the empty file on the first frame
        let (_file, video_id, path) = create_unique(&self.output_dir, stem, Self::EXTENSION)?;
        info!("Recording to {} at {} fps", path.display(), self.fps);

        Ok(OpenedSink {
            sink: Box::new(OpencvVideoSink::new(path.clone(), self.fps)),
            video_id,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame::new(vec![90; (width * height * 3) as usize], width, height, 0, 0)
    }

    #[test]
    fn test_avi_header_carries_frame_rate() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = OpencvSinkFactory::new(dir.path().join("videos"), 20);

        let mut opened = factory.open("session").unwrap();
        assert_eq!(opened.video_id, "session.avi");
        for _ in 0..3 {
            opened.sink.write_frame(&frame(64, 48)).unwrap();
        }
        opened.sink.finish().unwrap();

        let bytes = std::fs::read(&opened.path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(&bytes[24..28], b"avih");
        let micros_per_frame = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        assert_eq!(micros_per_frame, 50_000);
    }

    #[test]
    fn test_size_change_and_finish_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = OpencvSinkFactory::new(dir.path(), 20);
        let mut opened = factory.open("sizes").unwrap();

        opened.sink.write_frame(&frame(32, 24)).unwrap();
        assert!(matches!(
            opened.sink.write_frame(&frame(16, 16)),
            Err(RecordingError::FrameSize { .. })
        ));

        opened.sink.finish().unwrap();
        assert!(matches!(
            opened.sink.write_frame(&frame(32, 24)),
            Err(RecordingError::Finished)
        ));
        assert!(matches!(opened.sink.finish(), Err(RecordingError::Finished)));
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = OpencvSinkFactory::new(dir.path(), 20);
        assert_eq!(factory.open("clip").unwrap().video_id, "clip.avi");
        assert_eq!(factory.open("clip").unwrap().video_id, "clip_1.avi");
    }
}
