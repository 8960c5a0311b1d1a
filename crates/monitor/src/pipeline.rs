//! Frame Pipeline
//!
//! One call to [`FramePipeline::process_next`] moves a single frame through
//! capture, mirroring, landmark detection, feature extraction, debouncing,
//! annotation and recording. Frames are fed to the recorder after the
//! posture overlay is drawn and before the recording indicator is added.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_capture::{FrameSource, VideoFrame};
use posture::{
    compute_features, LandmarkProvider, OnnxPoseDetector, PoseLandmarks, PostureConfig,
    PostureSample, PostureState, PostureTracker, Thresholds,
};
#[cfg(not(feature = "webcam"))]
use recording::MjpegSinkFactory;
#[cfg(feature = "webcam")]
use recording::OpencvSinkFactory;
use recording::{FinishedRecording, RecordingController, SinkFactory, StartOutcome, StopOutcome};
use storage::{PostureRecord, SessionRecord, StatisticsStore};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::overlay::{self, Annotations};
use crate::status::{ControlResponse, ControlStatus, StatusSnapshot};
use crate::{MonitorConfig, MonitorError};

/// Result of processing one frame
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Mirrored, annotated frame
    pub frame: VideoFrame,
    pub landmarks: Option<PoseLandmarks>,
    /// `None` when nothing was detected or features could not be computed
    pub sample: Option<PostureSample>,
    pub state: PostureState,
}

/// The monitoring pipeline. Owns the capture source and the recorder.
pub struct FramePipeline {
    source: Option<Box<dyn FrameSource>>,
    provider: Box<dyn LandmarkProvider>,
    thresholds: Thresholds,
    tracker: PostureTracker,
    recorder: RecordingController,
    store: Option<Arc<dyn StatisticsStore>>,
    user_id: String,
    last_sample: Option<PostureSample>,
    /// Samples taken during the active recording
    posture_records: Vec<PostureRecord>,
    max_posture_records: usize,
    /// Incident count when the active recording started
    incidents_at_start: u32,
    frames_processed: u64,
}

impl FramePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        provider: Box<dyn LandmarkProvider>,
        recorder: RecordingController,
        config: &PostureConfig,
    ) -> Self {
        Self {
            source: Some(source),
            provider,
            thresholds: config.thresholds(),
            tracker: PostureTracker::new(config.debounce_frames),
            recorder,
            store: None,
            user_id: "default".to_string(),
            last_sample: None,
            posture_records: Vec::new(),
            max_posture_records: usize::MAX,
            incidents_at_start: 0,
            frames_processed: 0,
        }
    }

    /// Build the pipeline described by `config`: camera, ONNX detector and
    /// recorder (AVI at the capture frame rate with `webcam`, MJPEG otherwise)
    pub fn from_config(
        config: &MonitorConfig,
        store: Option<Arc<dyn StatisticsStore>>,
    ) -> Result<Self, MonitorError> {
        let source = camera_capture::open_source(&config.camera)?;
        let detector = OnnxPoseDetector::new(&config.posture)?;
        let recorder = RecordingController::new(
            sink_factory(config),
            config.recording.file_prefix.clone(),
        );

        let mut pipeline = Self::new(source, Box::new(detector), recorder, &config.posture)
            .with_max_posture_records(config.recording.max_posture_records);
        if let Some(store) = store {
            pipeline = pipeline.with_store(store, config.user_id.clone());
        }
        Ok(pipeline)
    }

    /// Persist finished recordings to `store` under `user_id`
    pub fn with_store(mut self, store: Arc<dyn StatisticsStore>, user_id: impl Into<String>) -> Self {
        self.store = Some(store);
        self.user_id = user_id.into();
        self
    }

    pub fn with_max_posture_records(mut self, max: usize) -> Self {
        self.max_posture_records = max;
        self
    }

    /// Process the next frame. `None` means end-of-stream; resources are
    /// released by then.
    pub fn process_next(&mut self) -> Option<ProcessedFrame> {
        let source = self.source.as_mut()?;

        let mut frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Capture source exhausted after {} frames", self.frames_processed);
                self.shutdown();
                return None;
            }
            Err(e) => {
                warn!("Capture failed, ending stream: {}", e);
                self.shutdown();
                return None;
            }
        };

        self.frames_processed += 1;
        metrics::record_frame();
        frame.mirror();

        let landmarks = match self.provider.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("Landmark detection failed on frame {}: {}", frame.sequence, e);
                None
            }
        };

        let sample = landmarks.as_ref().and_then(|landmarks| {
            metrics::record_detection();
            match compute_features(landmarks, &self.thresholds) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    debug!("No posture sample for frame {}: {}", frame.sequence, e);
                    None
                }
            }
        });

        if let Some(sample) = &sample {
            self.apply_sample(sample);
        }
        let state = self.tracker.state();

        let frame = self.annotate(frame, landmarks.as_ref(), sample.as_ref(), &state);
        self.recorder.feed(&frame);
        let frame = if self.recorder.is_recording() {
            with_recording_indicator(frame)
        } else {
            frame
        };

        Some(ProcessedFrame {
            frame,
            landmarks,
            sample,
            state,
        })
    }

    fn apply_sample(&mut self, sample: &PostureSample) {
        let previous = self.tracker.state();
        let state = self.tracker.update(sample.is_bad);
        if state.bad_posture_count > previous.bad_posture_count {
            metrics::record_incident();
        }
        metrics::record_sample(sample.neck_angle, sample.face_distance);

        if let Some(elapsed) = self.recorder.elapsed() {
            if self.posture_records.len() < self.max_posture_records {
                self.posture_records.push(PostureRecord {
                    elapsed_ms: elapsed.as_millis() as u64,
                    neck_angle: sample.neck_angle,
                    face_distance: sample.face_distance,
                    is_bad: sample.is_bad,
                });
            }
        }

        self.last_sample = Some(*sample);
    }

    fn annotate(
        &self,
        frame: VideoFrame,
        landmarks: Option<&PoseLandmarks>,
        sample: Option<&PostureSample>,
        state: &PostureState,
    ) -> VideoFrame {
        match frame.into_image() {
            Ok((mut img, timestamp_ns, sequence)) => {
                overlay::annotate(
                    &mut img,
                    &Annotations {
                        landmarks,
                        sample,
                        is_currently_bad: state.is_currently_bad,
                        thresholds: &self.thresholds,
                    },
                );
                VideoFrame::from_image(img, timestamp_ns, sequence)
            }
            Err(frame) => {
                warn!("Malformed frame {}, skipping overlay", frame.sequence);
                frame
            }
        }
    }

    /// Start recording (no-op when already recording)
    pub fn start_recording(&mut self) -> ControlResponse {
        if self.source.is_none() {
            return ControlResponse::failed("capture source closed");
        }

        match self.recorder.start() {
            Ok(StartOutcome::Started { video_id, .. }) => {
                self.posture_records.clear();
                self.incidents_at_start = self.tracker.state().bad_posture_count;
                ControlResponse::new(ControlStatus::RecordingStarted).with_video_id(video_id)
            }
            Ok(StartOutcome::AlreadyRecording) => {
                ControlResponse::new(ControlStatus::AlreadyRecording)
            }
            Err(e) => {
                warn!("Failed to start recording: {}", e);
                ControlResponse::failed(e.to_string())
            }
        }
    }

    /// Stop recording (no-op when idle) and persist the session
    pub fn stop_recording(&mut self) -> ControlResponse {
        match self.recorder.stop() {
            StopOutcome::Stopped(finished) => {
                let video_id = finished.video_id.clone();
                self.persist_session(finished);
                ControlResponse::new(ControlStatus::RecordingStopped).with_video_id(video_id)
            }
            StopOutcome::NotRecording => ControlResponse::new(ControlStatus::NotRecording),
        }
    }

    fn persist_session(&mut self, finished: FinishedRecording) {
        let posture_records = std::mem::take(&mut self.posture_records);
        let Some(store) = &self.store else {
            return;
        };

        let record = SessionRecord {
            user_id: self.user_id.clone(),
            recorded_at: finished.started_at.naive_local(),
            video_id: finished.video_id,
            duration_secs: finished.duration.as_secs_f64(),
            posture_records,
            bad_posture_count: self
                .tracker
                .state()
                .bad_posture_count
                .saturating_sub(self.incidents_at_start),
        };

        match store.save_session(record) {
            Ok(id) => info!("Saved recording session {} for {}", id, self.user_id),
            Err(e) => warn!("Failed to save recording session: {}", e),
        }
    }

    /// Current status
    pub fn status(&self) -> StatusSnapshot {
        let state = self.tracker.state();
        StatusSnapshot {
            angle: self.last_sample.map_or(0.0, |s| s.neck_angle),
            face_distance: self.last_sample.map_or(0.0, |s| s.face_distance),
            is_bad_posture: self.last_sample.map_or(false, |s| s.is_bad),
            is_currently_bad: state.is_currently_bad,
            bad_posture_count: state.bad_posture_count,
            is_recording: self.recorder.is_recording(),
            recording_time: self.recorder.elapsed().map(|d| d.as_secs()),
        }
    }

    /// Latest posture state
    pub fn state(&self) -> PostureState {
        self.tracker.state()
    }

    /// Start over with a clean posture state (new user/session)
    pub fn reset_posture(&mut self) {
        self.tracker.reset();
        self.last_sample = None;
        self.incidents_at_start = 0;
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Whether the capture source is still open
    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Process frames until end-of-stream or until `shutdown` is raised.
    /// Returns the number of frames processed.
    pub fn run<F>(&mut self, shutdown: &AtomicBool, mut on_frame: F) -> u64
    where
        F: FnMut(&mut FramePipeline, ProcessedFrame),
    {
        info!("Monitoring loop started");
        let start = self.frames_processed;

        while !shutdown.load(Ordering::Relaxed) {
            match self.process_next() {
                Some(processed) => on_frame(self, processed),
                None => break,
            }
        }

        self.shutdown();
        let frames = self.frames_processed - start;
        info!("Monitoring loop stopped after {} frames", frames);
        frames
    }

    /// Stop any recording and release the capture source. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording();
        }
        if let Some(mut source) = self.source.take() {
            source.close();
            info!("Capture source released");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(feature = "webcam")]
fn sink_factory(config: &MonitorConfig) -> Box<dyn SinkFactory> {
    Box::new(OpencvSinkFactory::from_config(
        &config.recording,
        config.camera.fps,
    ))
}

#[cfg(not(feature = "webcam"))]
fn sink_factory(config: &MonitorConfig) -> Box<dyn SinkFactory> {
    Box::new(MjpegSinkFactory::from_config(&config.recording))
}

fn with_recording_indicator(frame: VideoFrame) -> VideoFrame {
    match frame.into_image() {
        Ok((mut img, timestamp_ns, sequence)) => {
            overlay::draw_recording_indicator(&mut img);
            VideoFrame::from_image(img, timestamp_ns, sequence)
        }
        Err(frame) => frame,
    }
}
