//! Pose controller
//!
//! The controller lives on the capture side. It owns the shared frame
//! buffer, the command channel and the display queue, spawns the pose
//! worker thread and drives it through start-up, recording, saving and
//! shutdown.
//!
//! # Example
//!
//! ```ignore
//! use posegate::{controller::PoseController, PoseConfig};
//!
//! let config = PoseConfig::default();
//! let mut controller = PoseController::new(config.clone(), 640, 480);
//! let ready = controller.start_worker(model, None, config.timeouts.start())?;
//! // capture thread publishes into controller.frames()
//! controller.save_pose("take1", config.timeouts.save());
//! controller.stop_worker();
//! ```

pub mod recording;
pub mod writer;

pub use recording::{request_write, start_recording, stop_recording};
pub use writer::WriterWorker;

use crate::channel::{Command, CommandChannel, DisplayQueue, Domain, Route, Verb};
use crate::config::PoseConfig;
use crate::error::{PoseError, Result, ResultExt};
use crate::frame_buffer::FrameBuffer;
use crate::stream::{NullSink, PoseSink, UdpPoseSink};
use crate::types::{Clock, Pose, SystemClock};
use crate::worker::{PoseModel, PoseWorker, PostProcessor, WorkerLinks};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Name given to the pose worker thread
pub const WORKER_THREAD_NAME: &str = "pose-worker";

/// Granularity of the bounded join
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How a call to [`PoseController::stop_worker`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker acknowledged `end` and its thread exited cleanly
    Graceful,
    /// The worker did not exit within the grace period and was detached
    Forced,
    /// The worker thread ended with an error or panicked
    Crashed,
    /// There was no worker to stop
    NotRunning,
}

impl StopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StopOutcome::Graceful | StopOutcome::NotRunning)
    }
}

struct WorkerHandle {
    thread: JoinHandle<Result<()>>,
    abort: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Controller side of the pose worker
pub struct PoseController {
    config: PoseConfig,
    frames: Arc<FrameBuffer>,
    channel: CommandChannel,
    display: DisplayQueue<Pose>,
    clock: Arc<dyn Clock>,
    writer: Option<Box<dyn WriterWorker>>,
    worker: Option<WorkerHandle>,
    /// Last pose handed to the display, kept when the queue is empty
    display_pose: Option<Pose>,
}

impl PoseController {
    /// Create a controller for frames of `width` x `height`
    pub fn new(config: PoseConfig, width: u32, height: u32) -> Self {
        let channel = CommandChannel::new(config.channel_capacity);
        Self {
            config,
            frames: Arc::new(FrameBuffer::new(width, height)),
            channel,
            display: DisplayQueue::default(),
            clock: Arc::new(SystemClock),
            writer: None,
            worker: None,
            display_pose: None,
        }
    }

    /// Use another time source; capture must publish with the same clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach the video writer worker used by recording
    pub fn with_writer(mut self, writer: Box<dyn WriterWorker>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn set_writer(&mut self, writer: Option<Box<dyn WriterWorker>>) {
        self.writer = writer;
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Frame buffer the capture thread publishes into
    pub fn frames(&self) -> Arc<FrameBuffer> {
        self.frames.clone()
    }

    /// Command channel shared with the workers
    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Spawn the pose worker and wait for its start-up report
    ///
    /// Returns the worker's readiness, or `false` if no report arrived
    /// within `timeout`. The worker keeps running either way.
    pub fn start_worker(
        &mut self,
        model: Box<dyn PoseModel>,
        processor: Option<Box<dyn PostProcessor>>,
        timeout: Duration,
    ) -> Result<bool> {
        if self.is_worker_alive() {
            return Err(PoseError::Worker("pose worker already running".into()));
        }
        if let Some(stale) = self.worker.take() {
            // Collect the exit status of a worker that ended on its own
            Self::join_finished(stale);
        }

        let sink = self.build_sink()?;
        let abort = Arc::new(AtomicBool::new(false));
        let links = WorkerLinks {
            frames: self.frames.clone(),
            channel: self.channel.clone(),
            display: self.display.clone(),
            clock: self.clock.clone(),
            abort: abort.clone(),
        };
        let worker = PoseWorker::new(
            links,
            model,
            processor,
            sink,
            self.config.rate_mode,
            self.config.idle_poll(),
        );

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || worker.run())
            .context("spawning pose worker thread")?;
        self.worker = Some(WorkerHandle { thread, abort });

        let deadline = Instant::now() + timeout;
        let handle = self.worker.as_ref();
        let from_worker = self.channel.from_worker();
        let reply = from_worker.wait_while(
            |cmd| {
                if cmd.is(&Domain::Pose, &Verb::Start) {
                    Route::Accept
                } else {
                    Route::Requeue
                }
            },
            || {
                Instant::now() < deadline
                    && (handle.is_some_and(WorkerHandle::is_alive) || !from_worker.is_empty())
            },
        );

        match reply {
            Some(cmd) => {
                let ready = cmd.flag(0).unwrap_or(false);
                if ready {
                    tracing::info!("Pose worker ready");
                } else {
                    tracing::warn!("Pose worker started but is not ready");
                }
                Ok(ready)
            }
            None => {
                tracing::warn!("Pose worker did not report readiness within {:?}", timeout);
                Ok(false)
            }
        }
    }

    fn build_sink(&self) -> Result<Box<dyn PoseSink>> {
        if !self.config.stream.enabled {
            return Ok(Box::new(NullSink));
        }
        let sink = UdpPoseSink::new(&self.config.stream, self.clock.clone())
            .context("creating pose stream")?;
        Ok(Box::new(sink))
    }

    /// Ask the worker to end, drain its replies and join its thread
    ///
    /// Waiting for the end acknowledgment has no deadline; it only stops
    /// early if the worker thread dies, after one pass over the replies it
    /// left behind. Joining is bounded by the grace period, after which the
    /// worker is told to abort and is detached.
    pub fn stop_worker(&mut self) -> StopOutcome {
        let Some(handle) = self.worker.take() else {
            return StopOutcome::NotRunning;
        };

        if handle.is_alive() {
            if let Err(e) = self.channel.to_worker().write(Command::pose_end()) {
                tracing::warn!("Failed to send end request: {}", e);
            }

            let from_worker = self.channel.from_worker();
            let mut remaining: Option<usize> = None;
            let ack = from_worker.wait_while(
                |cmd| {
                    if cmd.is(&Domain::Pose, &Verb::End) {
                        Route::Accept
                    } else if cmd.domain == Domain::Pose {
                        Route::Discard
                    } else {
                        Route::Requeue
                    }
                },
                || {
                    if handle.is_alive() {
                        return true;
                    }
                    // Requeued replies never leave the queue, so only what was
                    // there when the thread died is worth looking at
                    let left = remaining.get_or_insert_with(|| from_worker.len());
                    if *left == 0 {
                        return false;
                    }
                    *left -= 1;
                    true
                },
            );
            if ack.is_none() {
                tracing::warn!("Pose worker exited without acknowledging end");
            }

            let deadline = Instant::now() + self.config.timeouts.join_grace();
            while handle.is_alive() && Instant::now() < deadline {
                std::thread::sleep(JOIN_POLL_INTERVAL);
            }
            if handle.is_alive() {
                tracing::error!(
                    "Pose worker did not exit within {:?}, detaching",
                    self.config.timeouts.join_grace()
                );
                handle.abort.store(true, Ordering::Release);
                return StopOutcome::Forced;
            }
        }

        Self::join_finished(handle)
    }

    fn join_finished(handle: WorkerHandle) -> StopOutcome {
        match handle.thread.join() {
            Ok(Ok(())) => {
                tracing::info!("Pose worker stopped");
                StopOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::error!("Pose worker failed: {}", e);
                StopOutcome::Crashed
            }
            Err(_) => {
                tracing::error!("Pose worker panicked");
                StopOutcome::Crashed
            }
        }
    }

    /// Start recording on the writer and the pose worker
    pub fn start_recording(&mut self, timeout: Duration) -> bool {
        let pose_alive = self.is_worker_alive();
        let writer = self
            .writer
            .as_mut()
            .map(|w| w.as_mut() as &mut dyn WriterWorker);
        recording::start_recording(&self.channel, pose_alive, writer, timeout)
    }

    /// Stop recording on the writer and the pose worker
    pub fn stop_recording(&mut self, timeout: Duration) -> bool {
        let pose_alive = self.is_worker_alive();
        let writer = self
            .writer
            .as_mut()
            .map(|w| w.as_mut() as &mut dyn WriterWorker);
        recording::stop_recording(&self.channel, pose_alive, writer, timeout)
    }

    /// Ask the worker to persist its history under `prefix`
    ///
    /// `false` when the worker is not running, the save failed or no reply
    /// arrived within `timeout`.
    pub fn save_pose(&mut self, prefix: impl AsRef<Path>, timeout: Duration) -> bool {
        let prefix = prefix.as_ref();
        if !self.is_worker_alive() {
            tracing::warn!("Cannot save poses, pose worker is not running");
            return false;
        }
        if let Err(e) = self.channel.to_worker().write(Command::pose_save(prefix)) {
            tracing::warn!("Failed to request pose save: {}", e);
            return false;
        }

        let reply = self.channel.from_worker().wait_for(timeout, |cmd| {
            if !cmd.is(&Domain::Pose, &Verb::Save) {
                Route::Requeue
            } else if cmd.path(0).as_deref() == Some(prefix) {
                Route::Accept
            } else {
                Route::Discard
            }
        });
        match reply {
            Some(cmd) => cmd.flag(1).unwrap_or(false),
            None => {
                tracing::warn!("No save confirmation for {} within {:?}", prefix.display(), timeout);
                false
            }
        }
    }

    /// Most recent pose for display, scaled by the display factor
    ///
    /// Keeps returning the last pose while the worker has nothing newer.
    pub fn display_pose(&mut self) -> Option<&Pose> {
        if let Some(pose) = self.display.read(true) {
            let factor = self.config.display_resize;
            self.display_pose = Some(if factor != 1.0 {
                pose.scaled(factor)
            } else {
                pose
            });
        }
        self.display_pose.as_ref()
    }

    pub fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(WorkerHandle::is_alive)
    }
}

impl Drop for PoseController {
    fn drop(&mut self) {
        if let Some(handle) = &self.worker {
            if handle.is_alive() {
                tracing::debug!("Controller dropped with a live worker, aborting it");
                handle.abort.store(true, Ordering::Release);
            }
        }
    }
}
