//! Prometheus metrics for the monitoring pipeline.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::MonitorError;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_TOTAL: &str = "posture_frames_total";
    pub const DETECTIONS_TOTAL: &str = "posture_detections_total";
    pub const INCIDENTS_TOTAL: &str = "posture_incidents_total";
    pub const NECK_ANGLE_DEGREES: &str = "posture_neck_angle_degrees";
    pub const FACE_DISTANCE: &str = "posture_face_distance";

    // Emitted by the recording crate
    pub const RECORDING_FRAMES_TOTAL: &str = "recording_frames_total";
    pub const RECORDING_WRITE_ERRORS_TOTAL: &str = "recording_write_errors_total";
}

/// Serve `/metrics` on `addr`. Must run inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MonitorError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MonitorError::Metrics(e.to_string()))?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

pub fn record_frame() {
    counter!(names::FRAMES_TOTAL).increment(1);
}

pub fn record_detection() {
    counter!(names::DETECTIONS_TOTAL).increment(1);
}

pub fn record_incident() {
    counter!(names::INCIDENTS_TOTAL).increment(1);
}

pub fn record_sample(neck_angle: f32, face_distance: f32) {
    gauge!(names::NECK_ANGLE_DEGREES).set(neck_angle as f64);
    gauge!(names::FACE_DISTANCE).set(face_distance as f64);
}
