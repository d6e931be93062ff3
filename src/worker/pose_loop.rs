//! Pose worker loop
//!
//! This module contains the loop that runs on the dedicated pose thread.
//! It ties the shared frame buffer, the rate governor, the model, the
//! streaming sink and the command channel together.
//!
//! # Iteration
//!
//! 1. Ask the [`RateGovernor`] whether the frame in the slot is new enough
//! 2. Run inference and note the completion time
//! 3. Stream the pose, overwrite the display queue, append to the history
//!    while recording
//! 4. Service at most one command; foreign-domain commands go back onto
//!    the to-worker queue untouched
//! 5. Leave the loop once `end` was handled and acknowledge with `(pose,end)`
//!
//! # Failures
//!
//! An inference error ends the loop and the thread with an `Err`. No end
//! acknowledgment is sent; the controller notices through liveness. A
//! malformed `pose` command is logged and ignored.

use super::governor::{RateGovernor, RateMode};
use super::model::{PoseModel, PostProcessor};
use crate::channel::{Command, CommandChannel, DisplayQueue, Domain, PoseCommand};
use crate::error::{PoseError, Result};
use crate::frame_buffer::{FrameBuffer, FrameView};
use crate::session::{save_history, PoseHistory};
use crate::stream::{PoseSink, SinkStats};
use crate::types::{Clock, Pose};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of the worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Running,
    /// `end` was handled; the loop exits after this iteration
    Ending,
    /// The controller gave up waiting and asked the thread to stop
    Aborted,
}

/// Counters kept by the worker for its shutdown report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames that went through inference
    pub frames_processed: u64,
    /// Pose commands handled, including malformed ones
    pub commands_handled: u64,
    /// Foreign commands put back on the queue
    pub commands_rerouted: u64,
}

/// Shared handles the worker needs from its controller
#[derive(Clone)]
pub struct WorkerLinks {
    /// Latest captured frame
    pub frames: Arc<FrameBuffer>,
    /// Command link to the controller and sibling workers
    pub channel: CommandChannel,
    /// Live display output
    pub display: DisplayQueue<Pose>,
    /// Time source shared with capture
    pub clock: Arc<dyn Clock>,
    /// Coercive stop flag set by the controller
    pub abort: Arc<AtomicBool>,
}

/// The pose worker; owns its model, sink and recording state
pub struct PoseWorker {
    links: WorkerLinks,
    model: Box<dyn PoseModel>,
    processor: Option<Box<dyn PostProcessor>>,
    sink: Box<dyn PoseSink>,
    governor: RateGovernor,
    history: PoseHistory,
    keypoint_names: Vec<String>,
    /// Whether processed poses are kept for saving
    recording: bool,
    ready: bool,
    state: WorkerState,
    idle_poll: Duration,
    stats: WorkerStats,
    /// Capture and worker clocks disagree; reported once
    clock_skew: bool,
}

impl PoseWorker {
    /// Create a worker; nothing runs until [`PoseWorker::run`] or [`PoseWorker::initialize`]
    pub fn new(
        links: WorkerLinks,
        model: Box<dyn PoseModel>,
        processor: Option<Box<dyn PostProcessor>>,
        sink: Box<dyn PoseSink>,
        mode: RateMode,
        idle_poll: Duration,
    ) -> Self {
        Self {
            links,
            model,
            processor,
            sink,
            governor: RateGovernor::new(mode),
            history: PoseHistory::new(),
            keypoint_names: Vec::new(),
            recording: false,
            ready: false,
            state: WorkerState::Running,
            idle_poll,
            stats: WorkerStats::default(),
            clock_skew: false,
        }
    }

    /// Run on the worker thread: start-up report, loop, end acknowledgment
    pub fn run(mut self) -> Result<()> {
        tracing::info!("Pose worker started ({})", self.governor.mode());

        let ready = self.initialize();
        self.reply(Command::pose_start(ready));

        while self.state == WorkerState::Running {
            if let Err(e) = self.step() {
                tracing::error!(
                    "Pose worker failed after {} frames: {}",
                    self.stats.frames_processed,
                    e
                );
                return Err(e);
            }
        }

        if !self.history.is_empty() {
            tracing::warn!("Discarding {} without saving", self.history.summary());
        }

        if self.state == WorkerState::Ending {
            self.reply(Command::pose_end());
        }
        tracing::info!(
            "Pose worker stopped: {} frames, {} commands, {} rerouted",
            self.stats.frames_processed,
            self.stats.commands_handled,
            self.stats.commands_rerouted
        );
        if let Some(delivery) = self.sink.stats() {
            tracing::info!(
                "Stream closed: {} datagrams sent, {} dropped",
                delivery.sent,
                delivery.failed
            );
        }
        Ok(())
    }

    /// Prepare the model on the latest frame; `false` when not ready
    ///
    /// A worker that is not ready keeps servicing commands but never infers.
    pub fn initialize(&mut self) -> bool {
        self.ready = match self.links.frames.latest() {
            None => {
                tracing::warn!("No frame available, pose model not initialized");
                false
            }
            Some(view) => match self.model.init(&view.frame, view.capture_time) {
                Ok(ready) => ready,
                Err(e) => {
                    tracing::error!("Pose model failed to initialize: {}", e);
                    false
                }
            },
        };
        if self.ready {
            self.keypoint_names = self.model.keypoint_names();
        }
        self.ready
    }

    /// One loop iteration
    pub fn step(&mut self) -> Result<WorkerState> {
        if self.links.abort.load(Ordering::Acquire) {
            tracing::warn!("Pose worker aborted by controller");
            self.state = WorkerState::Aborted;
            return Ok(self.state);
        }

        let processed = if self.ready {
            self.process_frame()?
        } else {
            false
        };
        self.service_command(processed);
        Ok(self.state)
    }

    fn process_frame(&mut self) -> Result<bool> {
        let Some(FrameView {
            frame,
            capture_time,
        }) = self.links.frames.latest()
        else {
            return Ok(false);
        };
        if !self.governor.should_process(Some(capture_time)) {
            return Ok(false);
        }

        let started_at = self.links.clock.now();
        if !self.clock_skew && self.governor.clock_skewed(capture_time, started_at) {
            self.clock_skew = true;
            tracing::warn!(
                "Frame captured at {} but the worker clock reads {}; stamp frames with the worker clock or most will be skipped",
                capture_time,
                started_at
            );
        }
        self.governor.record_start(capture_time, started_at);

        let pose = self
            .model
            .infer(&frame, capture_time)
            .map_err(|e| match e {
                PoseError::Inference(_) => e,
                other => PoseError::Inference(other.to_string()),
            })
            .map_err(|e| e.with_context(format!("frame captured at {}", capture_time)))?;
        let pose_time = self.links.clock.now();

        self.sink.send(&pose, capture_time);
        self.links.display.write(pose.clone(), true);
        if self.recording {
            self.history.push(pose, pose_time, capture_time);
        }

        self.stats.frames_processed += 1;
        tracing::trace!(
            "Processed frame {} in {:.4}s",
            capture_time,
            pose_time - started_at
        );
        Ok(true)
    }

    fn service_command(&mut self, processed: bool) {
        let queue = self.links.channel.to_worker();
        let cmd = if processed {
            queue.read()
        } else {
            queue.read_timeout(self.idle_poll)
        };
        let Some(cmd) = cmd else {
            return;
        };

        if cmd.domain != Domain::Pose {
            tracing::trace!("Re-routing {}", cmd);
            self.stats.commands_rerouted += 1;
            if let Err(e) = queue.write(cmd) {
                tracing::warn!("Failed to re-route command: {}", e);
            }
            if !processed {
                // Leave the foreign command for its consumer instead of spinning on it
                std::thread::sleep(self.idle_poll);
            }
            return;
        }

        self.stats.commands_handled += 1;
        match PoseCommand::parse(&cmd) {
            Ok(PoseCommand::Write(enabled)) => {
                tracing::info!("Recording {}", if enabled { "enabled" } else { "disabled" });
                self.recording = enabled;
                self.reply(Command::pose_write(enabled));
            }
            Ok(PoseCommand::Save(path)) => {
                let saved = self.save(&path);
                self.reply(Command::pose_save_reply(&path, saved));
            }
            Ok(PoseCommand::End) => {
                tracing::info!("End requested");
                self.state = WorkerState::Ending;
            }
            Err(reason) => {
                tracing::warn!("Ignoring malformed pose command: {}", reason);
            }
        }
    }

    fn save(&mut self, path: &Path) -> bool {
        let processor = self
            .processor
            .as_mut()
            .map(|p| p.as_mut() as &mut dyn PostProcessor);
        save_history(&mut self.history, &self.keypoint_names, processor, path)
    }

    fn reply(&self, cmd: Command) {
        if let Err(e) = self.links.channel.from_worker().write(cmd) {
            tracing::warn!("Failed to send reply: {}", e);
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Whether a frame stamped with a foreign clock was seen
    pub fn clock_skew_detected(&self) -> bool {
        self.clock_skew
    }

    /// Delivery counters of the streaming sink, if it keeps any
    pub fn sink_stats(&self) -> Option<SinkStats> {
        self.sink.stats()
    }
}
