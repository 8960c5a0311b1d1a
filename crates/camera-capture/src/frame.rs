//! Video frame types and processing

use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a black frame
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(vec![0; (width * height * 3) as usize], width, height, 0, 0)
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Flip horizontally in place (selfie view)
    pub fn mirror(&mut self) {
        let width = self.width as usize;
        let row_len = width * 3;
        if row_len == 0 {
            return;
        }

        for row in self.data.chunks_exact_mut(row_len) {
            for x in 0..width / 2 {
                let left = x * 3;
                let right = (width - 1 - x) * 3;
                for c in 0..3 {
                    row.swap(left + c, right + c);
                }
            }
        }
    }

    /// Take the pixel buffer as an `image` buffer, keeping the metadata
    /// needed to rebuild the frame with [`VideoFrame::from_image`].
    pub fn into_image(self) -> Result<(RgbImage, u64, u32), VideoFrame> {
        let (width, height, timestamp_ns, sequence) =
            (self.width, self.height, self.timestamp_ns, self.sequence);
        if !self.is_well_formed() {
            return Err(self);
        }
        match RgbImage::from_raw(width, height, self.data) {
            Some(img) => Ok((img, timestamp_ns, sequence)),
            None => Err(VideoFrame::blank(width, height)),
        }
    }

    /// Rebuild a frame from an `image` buffer
    pub fn from_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, timestamp_ns, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, (x + y) as u8]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = gradient(4, 3);
        assert_eq!(frame.get_pixel(2, 1), Some([2, 1, 3]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 3), None);
    }

    #[test]
    fn test_mirror_swaps_columns() {
        let mut frame = gradient(5, 2);
        frame.mirror();
        assert_eq!(frame.get_pixel(0, 0), Some([4, 0, 4]));
        assert_eq!(frame.get_pixel(4, 1), Some([0, 1, 1]));
        // Center column stays put on odd widths
        assert_eq!(frame.get_pixel(2, 1), Some([2, 1, 3]));
    }

    #[test]
    fn test_mirror_empty_frame() {
        let mut frame = VideoFrame::blank(0, 0);
        frame.mirror();
        assert!(frame.data.is_empty());
    }

    #[test]
    fn test_image_conversion_keeps_metadata() {
        let mut frame = gradient(3, 3);
        frame.timestamp_ns = 42;
        frame.sequence = 7;

        let (img, ts, seq) = frame.clone().into_image().unwrap();
        let rebuilt = VideoFrame::from_image(img, ts, seq);
        assert_eq!(rebuilt.data, frame.data);
        assert_eq!(rebuilt.timestamp_ns, 42);
        assert_eq!(rebuilt.sequence, 7);
    }

    #[test]
    fn test_malformed_frame_is_returned() {
        let frame = VideoFrame::new(vec![0; 5], 2, 2, 0, 0);
        assert!(frame.into_image().is_err());
    }

    proptest! {
        #[test]
        fn mirror_twice_is_identity(width in 1u32..16, height in 1u32..8) {
            let original = gradient(width, height);
            let mut frame = original.clone();
            frame.mirror();
            frame.mirror();
            prop_assert_eq!(frame.data, original.data);
        }
    }
}
