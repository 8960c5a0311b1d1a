//! Thread-safe façade over a running pipeline
//!
//! The pipeline loop runs on a blocking thread. Control requests are queued
//! and applied between frames; status and the latest annotated frame are
//! published after every frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_capture::VideoFrame;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pipeline::FramePipeline;
use crate::status::{ControlResponse, StatusSnapshot};
use crate::MonitorError;

const COMMAND_QUEUE_SIZE: usize = 16;

enum Command {
    StartRecording(oneshot::Sender<ControlResponse>),
    StopRecording(oneshot::Sender<ControlResponse>),
    ResetPosture(oneshot::Sender<StatusSnapshot>),
}

fn apply(pipeline: &mut FramePipeline, command: Command) {
    // A dropped receiver only means the caller stopped waiting
    match command {
        Command::StartRecording(reply) => {
            let _ = reply.send(pipeline.start_recording());
        }
        Command::StopRecording(reply) => {
            let _ = reply.send(pipeline.stop_recording());
        }
        Command::ResetPosture(reply) => {
            pipeline.reset_posture();
            let _ = reply.send(pipeline.status());
        }
    }
}

/// Handle to a pipeline running on its own thread
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<StatusSnapshot>,
    frames: watch::Receiver<Option<Arc<VideoFrame>>>,
    shutdown: Arc<AtomicBool>,
    task: Option<JoinHandle<u64>>,
}

impl MonitorHandle {
    /// Move `pipeline` onto a blocking thread and start processing.
    /// Must be called from within a tokio runtime.
    pub fn spawn(pipeline: FramePipeline) -> Self {
        let (command_tx, mut command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (status_tx, status_rx) = watch::channel(pipeline.status());
        let (frame_tx, frame_rx) = watch::channel(None);
        let shutdown = Arc::new(AtomicBool::new(false));
        let loop_shutdown = shutdown.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut pipeline = pipeline;
            let frames = pipeline.run(&loop_shutdown, |pipeline, processed| {
                while let Ok(command) = command_rx.try_recv() {
                    apply(pipeline, command);
                }
                status_tx.send_replace(pipeline.status());
                frame_tx.send_replace(Some(Arc::new(processed.frame)));
            });

            // Pending requests fail with `Stopped` once their senders drop
            command_rx.close();
            status_tx.send_replace(pipeline.status());
            debug!("Monitor thread exiting");
            frames
        });

        info!("Monitor started");
        Self {
            commands: command_tx,
            status: status_rx,
            frames: frame_rx,
            shutdown,
            task: Some(task),
        }
    }

    pub async fn start_recording(&self) -> Result<ControlResponse, MonitorError> {
        self.request(Command::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<ControlResponse, MonitorError> {
        self.request(Command::StopRecording).await
    }

    /// Clear the posture state; returns the status right after the reset
    pub async fn reset_posture(&self) -> Result<StatusSnapshot, MonitorError> {
        self.request(Command::ResetPosture).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| MonitorError::Stopped)?;
        reply_rx.await.map_err(|_| MonitorError::Stopped)
    }

    /// Latest published status
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified after every processed frame
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Most recent annotated frame
    pub fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frames.borrow().clone()
    }

    /// Receiver for the annotated frame stream
    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Arc<VideoFrame>>> {
        self.frames.clone()
    }

    /// Whether the loop has ended (end-of-stream or shutdown)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the loop to end on its own. Returns the frames processed.
    pub async fn join(mut self) -> Result<u64, MonitorError> {
        self.wait().await
    }

    /// Stop the loop after the current frame and wait for it.
    /// Returns the frames processed.
    pub async fn shutdown(mut self) -> Result<u64, MonitorError> {
        self.shutdown.store(true, Ordering::Relaxed);
        let frames = self.wait().await?;
        info!("Monitor stopped after {} frames", frames);
        Ok(frames)
    }

    async fn wait(&mut self) -> Result<u64, MonitorError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| MonitorError::Task(e.to_string())),
            None => Ok(0),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
