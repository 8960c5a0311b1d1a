//! End-to-end pipeline tests with scripted capture, landmarks and sinks

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use camera_capture::{CameraConfig, CameraError, FrameSource, ImageSequenceSource, VideoFrame};
use monitor::overlay::{rec_indicator_center, BAD_COLOR, REC_COLOR};
use monitor::{ControlStatus, FramePipeline};
use posture::{BodyPart, Keypoint, LandmarkProvider, PoseLandmarks, PostureConfig, PostureError};
use recording::{
    MjpegSinkFactory, OpenedSink, RecordingController, RecordingError, SinkFactory, VideoSink,
};
use storage::{DateRange, InMemoryStore, StatisticsStore};

const WIDTH: u32 = 96;
const HEIGHT: u32 = 72;

#[derive(Default)]
struct Observed {
    closed: u32,
    finished: u32,
    recorded: Vec<VideoFrame>,
}

struct ScriptedSource {
    frames: VecDeque<VideoFrame>,
    observed: Arc<Mutex<Observed>>,
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.observed.lock().unwrap().closed += 1;
    }
}

/// Replays a fixed list of landmark sets; `None` entries mean nobody in view
struct ScriptedProvider {
    script: VecDeque<Option<PoseLandmarks>>,
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<PoseLandmarks>, PostureError> {
        Ok(self.script.pop_front().flatten())
    }
}

struct CapturingSink {
    observed: Arc<Mutex<Observed>>,
}

impl VideoSink for CapturingSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecordingError> {
        self.observed.lock().unwrap().recorded.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        self.observed.lock().unwrap().finished += 1;
        Ok(())
    }
}

struct CapturingFactory {
    observed: Arc<Mutex<Observed>>,
}

impl SinkFactory for CapturingFactory {
    fn open(&mut self, stem: &str) -> Result<OpenedSink, RecordingError> {
        Ok(OpenedSink {
            sink: Box::new(CapturingSink {
                observed: self.observed.clone(),
            }),
            video_id: format!("{}.raw", stem),
            path: PathBuf::from(stem),
        })
    }
}

fn upright() -> PoseLandmarks {
    PoseLandmarks::new()
        .with(BodyPart::LeftEar, Keypoint::new(0.5, 0.2, 1.0))
        .with(BodyPart::RightEar, Keypoint::new(0.6, 0.2, 1.0))
        .with(BodyPart::LeftShoulder, Keypoint::new(0.5, 0.5, 1.0))
        .with(BodyPart::LeftHip, Keypoint::new(0.5, 0.9, 1.0))
}

/// Ear pushed forward to shoulder height: ~90° neck angle
fn slouched() -> PoseLandmarks {
    upright().with(BodyPart::LeftEar, Keypoint::new(0.8, 0.5, 1.0))
}

fn scripted_pipeline(script: Vec<Option<PoseLandmarks>>) -> (FramePipeline, Arc<Mutex<Observed>>) {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let source = ScriptedSource {
        frames: (0..script.len())
            .map(|i| VideoFrame::new(vec![0; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 0, i as u32))
            .collect(),
        observed: observed.clone(),
    };
    let provider = ScriptedProvider {
        script: script.into(),
    };
    let recorder = RecordingController::new(
        Box::new(CapturingFactory {
            observed: observed.clone(),
        }),
        "posture_recording",
    );
    let pipeline = FramePipeline::new(
        Box::new(source),
        Box::new(provider),
        recorder,
        &PostureConfig::default(),
    );
    (pipeline, observed)
}

#[test]
fn sustained_slouch_counts_one_incident_and_recovers() {
    let mut script: Vec<_> = (0..31).map(|_| Some(slouched())).collect();
    script.push(Some(upright()));
    let (mut pipeline, _) = scripted_pipeline(script);

    for i in 1..=30 {
        let processed = pipeline.process_next().unwrap();
        assert!(processed.sample.unwrap().is_bad);
        assert_eq!(processed.state.bad_streak_length, i);
        assert_eq!(processed.state.bad_posture_count, 0);
        assert!(!processed.state.is_currently_bad);
    }

    let processed = pipeline.process_next().unwrap();
    assert_eq!(processed.state.bad_posture_count, 1);
    assert!(processed.state.is_currently_bad);
    assert!(pipeline.status().is_bad_posture);

    let processed = pipeline.process_next().unwrap();
    assert!(!processed.state.is_currently_bad);
    assert_eq!(processed.state.bad_streak_length, 0);
    assert_eq!(processed.state.bad_posture_count, 1);

    assert!(pipeline.process_next().is_none());
}

#[test]
fn warning_banner_is_drawn_while_currently_bad() {
    let script: Vec<_> = (0..31).map(|_| Some(slouched())).collect();
    let (mut pipeline, _) = scripted_pipeline(script);

    let mut last = None;
    while let Some(processed) = pipeline.process_next() {
        last = Some(processed);
    }
    let last = last.unwrap();
    assert!(last.state.is_currently_bad);
    assert_eq!(last.frame.get_pixel(WIDTH / 2, HEIGHT - 2), Some(BAD_COLOR.0));
}

#[test]
fn recorded_frames_have_overlay_but_no_rec_indicator() {
    let script: Vec<_> = (0..31).map(|_| Some(slouched())).collect();
    let (mut pipeline, observed) = scripted_pipeline(script);

    assert_eq!(pipeline.start_recording().status, ControlStatus::RecordingStarted);
    let mut returned = Vec::new();
    while let Some(processed) = pipeline.process_next() {
        returned.push(processed.frame);
    }

    let observed = observed.lock().unwrap();
    assert_eq!(observed.recorded.len(), 31);

    let (x, y) = rec_indicator_center(WIDTH);
    let (x, y) = (x as u32, y as u32);
    for (recorded, shown) in observed.recorded.iter().zip(&returned) {
        assert_eq!(shown.get_pixel(x, y), Some(REC_COLOR.0));
        assert_ne!(recorded.get_pixel(x, y), Some(REC_COLOR.0));
    }

    // The banner from the 31st frame made it into the recording
    let last = observed.recorded.last().unwrap();
    assert_eq!(last.get_pixel(WIDTH / 2, HEIGHT - 2), Some(BAD_COLOR.0));
}

#[test]
fn shutdown_finishes_sink_and_closes_source_once() {
    let script: Vec<_> = (0..10).map(|_| Some(upright())).collect();
    let (mut pipeline, observed) = scripted_pipeline(script);

    pipeline.start_recording();
    for _ in 0..5 {
        pipeline.process_next();
    }
    pipeline.shutdown();
    pipeline.shutdown();
    assert!(pipeline.process_next().is_none());
    drop(pipeline);

    let observed = observed.lock().unwrap();
    assert_eq!(observed.finished, 1);
    assert_eq!(observed.closed, 1);
    assert_eq!(observed.recorded.len(), 5);
}

#[test]
fn end_of_stream_persists_recorded_session() {
    let script: Vec<_> = (0..35).map(|_| Some(slouched())).collect();
    let (pipeline, _) = scripted_pipeline(script);
    let store = Arc::new(InMemoryStore::new());
    let mut pipeline = pipeline.with_store(store.clone(), "student");

    pipeline.start_recording();
    while pipeline.process_next().is_some() {}

    let sessions = store.list_sessions("student", &DateRange::all()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].bad_posture_count, 1);

    let stats = store.user_stats("student", &DateRange::all()).unwrap();
    assert_eq!(stats.bad_posture_total, 1);
    assert_eq!(stats.daily_stats.len(), 1);
}

#[test]
fn image_sequence_to_mjpeg_file() {
    let frames_dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        image::RgbImage::from_pixel(WIDTH, HEIGHT, image::Rgb([30, 60, 90]))
            .save(frames_dir.path().join(format!("frame_{:03}.png", i)))
            .unwrap();
    }
    let out_dir = tempfile::tempdir().unwrap();

    let camera = CameraConfig {
        width: WIDTH,
        height: HEIGHT,
        frames_dir: Some(frames_dir.path().to_path_buf()),
        ..Default::default()
    };
    let source = ImageSequenceSource::open(frames_dir.path(), &camera).unwrap();
    let provider = ScriptedProvider {
        script: VecDeque::new(),
    };
    let recorder = RecordingController::new(
        Box::new(MjpegSinkFactory::new(out_dir.path().join("videos"), 80)),
        "posture_recording",
    );
    let mut pipeline = FramePipeline::new(
        Box::new(source),
        Box::new(provider),
        recorder,
        &PostureConfig::default(),
    );

    let response = pipeline.start_recording();
    let video_id = response.video_id.unwrap();
    assert!(video_id.starts_with("posture_recording_"));
    assert!(video_id.ends_with(".mjpeg"));

    let frames = pipeline.run(&std::sync::atomic::AtomicBool::new(false), |_, _| {});
    assert_eq!(frames, 4);
    assert!(!pipeline.is_recording());

    let bytes = std::fs::read(out_dir.path().join("videos").join(&video_id)).unwrap();
    let frame_starts = bytes
        .windows(3)
        .filter(|w| *w == [0xFF, 0xD8, 0xFF])
        .count();
    assert_eq!(frame_starts, 4);
}
