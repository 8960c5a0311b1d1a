//! Video sinks

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use camera_capture::VideoFrame;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::{debug, info, warn};

use crate::{RecordingConfig, RecordingError};

/// Destination for recorded frames
pub trait VideoSink: Send {
    /// Append one frame
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecordingError>;

    /// Flush and release the output; later writes fail
    fn finish(&mut self) -> Result<(), RecordingError>;
}

/// A freshly opened sink and its identity
pub struct OpenedSink {
    pub sink: Box<dyn VideoSink>,
    /// File name, used as the video id
    pub video_id: String,
    pub path: PathBuf,
}

/// Opens a new sink per recording
pub trait SinkFactory: Send {
    /// Open a sink for `stem` (prefix and timestamp, no extension)
    fn open(&mut self, stem: &str) -> Result<OpenedSink, RecordingError>;
}

/// Motion-JPEG file sink: each frame is a baseline JPEG, concatenated
pub struct MjpegFileSink {
    writer: Option<BufWriter<File>>,
    quality: u8,
    frame_size: Option<(u32, u32)>,
    frames_written: u64,
}

impl MjpegFileSink {
    pub fn new(file: File, quality: u8) -> Self {
        Self {
            writer: Some(BufWriter::new(file)),
            quality: quality.clamp(1, 100),
            frame_size: None,
            frames_written: 0,
        }
    }
}

impl VideoSink for MjpegFileSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecordingError> {
        let writer = self.writer.as_mut().ok_or(RecordingError::Finished)?;

        let size = (frame.width, frame.height);
        match self.frame_size {
            Some(expected) if expected != size => {
                return Err(RecordingError::FrameSize {
                    expected,
                    actual: size,
                });
            }
            None => self.frame_size = Some(size),
            _ => {}
        }

        JpegEncoder::new_with_quality(writer, self.quality)
            .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| RecordingError::Write(e.to_string()))?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        let mut writer = self.writer.take().ok_or(RecordingError::Finished)?;
        writer
            .flush()
            .map_err(|e| RecordingError::Write(e.to_string()))?;
        debug!("MJPEG sink finished after {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for MjpegFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush recording on drop: {}", e);
            }
        }
    }
}

/// Creates `<output_dir>/<stem>.mjpeg` files
pub struct MjpegSinkFactory {
    output_dir: PathBuf,
    quality: u8,
}

impl MjpegSinkFactory {
    pub const EXTENSION: &'static str = "mjpeg";

    pub fn new(output_dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.output_dir.clone(), config.jpeg_quality)
    }

}

/// Create `<dir>/<stem>.<extension>` (creating `dir` on demand), suffixing
/// `_N` on collisions. The file exists and is empty on success.
pub(crate) fn create_unique(
    dir: &Path,
    stem: &str,
    extension: &str,
) -> Result<(File, String, PathBuf), RecordingError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| RecordingError::SinkUnavailable(format!("{}: {}", dir.display(), e)))?;

    for attempt in 0..100u32 {
        let file_name = if attempt == 0 {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}_{}.{}", stem, attempt, extension)
        };
        let path = dir.join(&file_name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, file_name, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(RecordingError::SinkUnavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    Err(RecordingError::SinkUnavailable(format!(
        "no free file name for {}",
        stem
    )))
}

impl SinkFactory for MjpegSinkFactory {
    fn open(&mut self, stem: &str) -> Result<OpenedSink, RecordingError> {
        let (file, video_id, path) = create_unique(&self.output_dir, stem, Self::EXTENSION)?;
        info!("Recording to {}", path.display());

        Ok(OpenedSink {
            sink: Box::new(MjpegFileSink::new(file, self.quality)),
            video_id,
            path,
        })
    }
}
