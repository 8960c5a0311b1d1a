//! Image-sequence replay source

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays a directory of still images as a video stream.
///
/// Files are served in lexical order and resized to the configured capture
/// resolution, so recorded footage keeps a fixed frame size.
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    width: u32,
    height: u32,
    frame_interval_ns: u64,
    sequence: u32,
    closed: bool,
}

impl ImageSequenceSource {
    /// Scan `dir` for image files
    pub fn open(dir: impl AsRef<Path>, config: &CameraConfig) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        info!("Replaying {} frames from {}", paths.len(), dir.display());

        Ok(Self {
            pending: paths.into(),
            width: config.width,
            height: config.height,
            frame_interval_ns: config.frame_interval_ns(),
            sequence: 0,
            closed: false,
        })
    }

    /// Frames not yet served
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.closed {
            return Err(CameraError::Closed);
        }

        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let mut img = image::open(&path)
            .map_err(|e| CameraError::Decode(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        if img.dimensions() != (self.width, self.height) {
            img = imageops::resize(&img, self.width, self.height, FilterType::Triangle);
        }

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        debug!("Frame {} from {}", sequence, path.display());

        Ok(Some(VideoFrame::from_image(
            img,
            sequence as u64 * self.frame_interval_ns,
            sequence,
        )))
    }

    fn close(&mut self) {
        if !self.closed {
            self.pending.clear();
            self.closed = true;
            debug!("Image sequence source closed");
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn small_config() -> CameraConfig {
        CameraConfig {
            width: 8,
            height: 6,
            ..Default::default()
        }
    }

    #[test]
    fn test_replays_in_order_and_resizes() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(8, 6, Rgb([0, 255, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), &small_config()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([0, 255, 0]));
        assert_eq!(first.sequence, 0);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!((second.width, second.height), (8, 6));
        let [r, g, _] = second.get_pixel(3, 3).unwrap();
        assert!(r > 250 && g < 5);
        assert_eq!(second.timestamp_ns, 50_000_000);

        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_close_stops_stream() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 6).save(dir.path().join("a.png")).unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), &small_config()).unwrap();
        source.close();
        source.close();
        assert!(matches!(source.next_frame(), Err(CameraError::Closed)));
    }

    #[test]
    fn test_missing_directory() {
        let result = ImageSequenceSource::open("/definitely/not/here", &small_config());
        assert!(matches!(result, Err(CameraError::Open(_))));
    }
}
