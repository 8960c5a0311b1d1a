//! Frame annotations
//!
//! Everything is drawn with `imageproc`, which clips to the canvas, so
//! landmarks slightly outside the frame are safe to pass in.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use posture::{PoseLandmarks, PostureSample, Thresholds, SKELETON};

pub const SKELETON_COLOR: Rgb<u8> = Rgb([245, 117, 66]);
pub const KEYPOINT_COLOR: Rgb<u8> = Rgb([245, 66, 230]);
pub const GOOD_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const BAD_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
pub const TOO_CLOSE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
pub const REC_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const GAUGE_TRACK_COLOR: Rgb<u8> = Rgb([40, 40, 40]);
const GAUGE_TICK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const MARGIN: i32 = 10;
const GAUGE_HEIGHT: u32 = 8;
const GAUGE_MAX_WIDTH: u32 = 200;
const BANNER_HEIGHT: u32 = 20;
const KEYPOINT_RADIUS: i32 = 3;
const REC_RADIUS: i32 = 8;

/// What to draw for one frame
#[derive(Debug, Clone, Copy)]
pub struct Annotations<'a> {
    pub landmarks: Option<&'a PoseLandmarks>,
    pub sample: Option<&'a PostureSample>,
    /// Sustained bad posture, drives the warning banner
    pub is_currently_bad: bool,
    pub thresholds: &'a Thresholds,
}

/// Draw skeleton, gauges and the warning banner
pub fn annotate(img: &mut RgbImage, annotations: &Annotations<'_>) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }

    if let Some(landmarks) = annotations.landmarks {
        draw_skeleton(img, landmarks);
    }

    if let Some(sample) = annotations.sample {
        draw_gauges(img, sample, annotations.thresholds);
        if annotations.is_currently_bad {
            draw_warning_banner(img, sample.too_close);
        }
    }
}

/// Landmark connections and keypoint dots
pub fn draw_skeleton(img: &mut RgbImage, landmarks: &PoseLandmarks) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let to_px = |x: f32, y: f32| (x * w, y * h);

    for (a, b) in SKELETON.iter() {
        if let (Some(pa), Some(pb)) = (landmarks.get(*a), landmarks.get(*b)) {
            draw_line_segment_mut(img, to_px(pa.x, pa.y), to_px(pb.x, pb.y), SKELETON_COLOR);
        }
    }

    for (_, keypoint) in landmarks.iter() {
        let (x, y) = to_px(keypoint.x, keypoint.y);
        draw_filled_circle_mut(
            img,
            (x.round() as i32, y.round() as i32),
            KEYPOINT_RADIUS,
            KEYPOINT_COLOR,
        );
    }
}

/// Neck-angle and face-distance bars in the top-left corner, each with a
/// tick at its threshold
pub fn draw_gauges(img: &mut RgbImage, sample: &PostureSample, thresholds: &Thresholds) {
    let width = gauge_width(img);
    if width == 0 {
        return;
    }

    let angle_color = if sample.bad_angle { BAD_COLOR } else { GOOD_COLOR };
    draw_gauge(
        img,
        MARGIN,
        width,
        sample.neck_angle / 180.0,
        thresholds.angle_deg / 180.0,
        angle_color,
    );

    let distance_color = if sample.too_close { BAD_COLOR } else { GOOD_COLOR };
    draw_gauge(
        img,
        MARGIN + GAUGE_HEIGHT as i32 + 6,
        width,
        sample.face_distance,
        thresholds.distance,
        distance_color,
    );
}

/// Red bar along the bottom edge; orange end-cap when the face is too close
pub fn draw_warning_banner(img: &mut RgbImage, too_close: bool) {
    let height = BANNER_HEIGHT.min(img.height());
    let top = (img.height() - height) as i32;
    draw_filled_rect_mut(img, Rect::at(0, top).of_size(img.width(), height), BAD_COLOR);

    if too_close {
        let cap = (img.width() / 8).max(1);
        let left = (img.width() - cap) as i32;
        draw_filled_rect_mut(img, Rect::at(left, top).of_size(cap, height), TOO_CLOSE_COLOR);
    }
}

/// Red dot in the top-right corner
pub fn draw_recording_indicator(img: &mut RgbImage) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    draw_filled_circle_mut(img, rec_indicator_center(img.width()), REC_RADIUS, REC_COLOR);
}

/// Where the recording dot is drawn for a frame of `width`
pub fn rec_indicator_center(width: u32) -> (i32, i32) {
    (width as i32 - 2 * REC_RADIUS - 4, MARGIN + REC_RADIUS)
}

fn gauge_width(img: &RgbImage) -> u32 {
    (img.width() / 3).min(GAUGE_MAX_WIDTH)
}

fn draw_gauge(img: &mut RgbImage, top: i32, width: u32, value: f32, threshold: f32, color: Rgb<u8>) {
    draw_filled_rect_mut(
        img,
        Rect::at(MARGIN, top).of_size(width, GAUGE_HEIGHT),
        GAUGE_TRACK_COLOR,
    );

    let fill = (value.clamp(0.0, 1.0) * width as f32).round() as u32;
    if fill > 0 {
        draw_filled_rect_mut(img, Rect::at(MARGIN, top).of_size(fill, GAUGE_HEIGHT), color);
    }

    let tick_x = MARGIN as f32 + threshold.clamp(0.0, 1.0) * width as f32;
    draw_line_segment_mut(
        img,
        (tick_x, top as f32 - 2.0),
        (tick_x, (top + GAUGE_HEIGHT as i32) as f32 + 1.0),
        GAUGE_TICK_COLOR,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use posture::{BodyPart, Keypoint};

    fn sample(neck_angle: f32, face_distance: f32) -> PostureSample {
        PostureSample::classify(neck_angle, face_distance, &Thresholds::default())
    }

    fn canvas() -> RgbImage {
        RgbImage::new(640, 480)
    }

    #[test]
    fn test_gauge_colors_follow_classification() {
        let mut img = canvas();
        draw_gauges(&mut img, &sample(170.0, 0.2), &Thresholds::default());
        // Start of the angle bar, inside the fill
        assert_eq!(*img.get_pixel(MARGIN as u32 + 2, MARGIN as u32 + 2), GOOD_COLOR);

        let mut img = canvas();
        draw_gauges(&mut img, &sample(120.0, 0.2), &Thresholds::default());
        assert_eq!(*img.get_pixel(MARGIN as u32 + 2, MARGIN as u32 + 2), BAD_COLOR);
    }

    #[test]
    fn test_banner_end_cap_only_when_too_close() {
        let mut img = canvas();
        draw_warning_banner(&mut img, false);
        assert_eq!(*img.get_pixel(5, 475), BAD_COLOR);
        assert_eq!(*img.get_pixel(635, 475), BAD_COLOR);

        let mut img = canvas();
        draw_warning_banner(&mut img, true);
        assert_eq!(*img.get_pixel(5, 475), BAD_COLOR);
        assert_eq!(*img.get_pixel(635, 475), TOO_CLOSE_COLOR);
    }

    #[test]
    fn test_annotate_without_bad_state_has_no_banner() {
        let mut img = canvas();
        let s = sample(120.0, 0.2);
        annotate(
            &mut img,
            &Annotations {
                landmarks: None,
                sample: Some(&s),
                is_currently_bad: false,
                thresholds: &Thresholds::default(),
            },
        );
        assert_eq!(*img.get_pixel(320, 475), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_recording_indicator_position() {
        let mut img = canvas();
        draw_recording_indicator(&mut img);
        let (x, y) = rec_indicator_center(640);
        assert_eq!(*img.get_pixel(x as u32, y as u32), REC_COLOR);
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_skeleton_out_of_frame_is_clipped() {
        let mut img = RgbImage::new(32, 24);
        let landmarks = PoseLandmarks::new()
            .with(BodyPart::LeftShoulder, Keypoint::new(0.5, 0.5, 1.0))
            .with(BodyPart::LeftHip, Keypoint::new(1.8, -0.7, 1.0));
        draw_skeleton(&mut img, &landmarks);
        assert_eq!(*img.get_pixel(16, 12), KEYPOINT_COLOR);
    }

    #[test]
    fn test_tiny_frames_do_not_panic() {
        let mut img = RgbImage::new(2, 2);
        let s = sample(100.0, 0.9);
        annotate(
            &mut img,
            &Annotations {
                landmarks: None,
                sample: Some(&s),
                is_currently_bad: true,
                thresholds: &Thresholds::default(),
            },
        );
        draw_recording_indicator(&mut img);
    }
}
