//! # Posegate: real-time pose estimation worker
//!
//! Runs a pose estimator on a dedicated thread next to a camera capture
//! loop. The capture side publishes frames into a shared latest-value slot;
//! the worker infers poses at a rate it governs itself, streams them to a
//! renderer over UDP, feeds a live display and records them on request.
//!
//! ## Architecture
//!
//! - **Frame buffer**: One frame slot plus its capture timestamp, written by
//!   capture and read by the worker without copying
//! - **Command channel**: Two bounded queues shared by the controller and
//!   every worker; consumers re-enqueue commands addressed to someone else
//! - **Worker**: Rate governor, model, streaming sink and recording state
//!   in one loop
//! - **Controller**: Start-up, recording, saving and bounded shutdown
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `posegate`:
//!
//! - **Linux**: `~/.config/posegate/config.toml`
//! - **macOS**: `~/Library/Application Support/posegate/config.toml`
//! - **Windows**: `%APPDATA%\posegate\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use posegate::{PoseConfig, PoseController};
//!
//! let config = PoseConfig::load_or_default(None);
//! let mut controller = PoseController::new(config.clone(), 640, 480);
//! let frames = controller.frames();
//! let clock = controller.clock();
//! std::thread::spawn(move || loop {
//!     let frame = camera.grab();
//!     // Same clock as the worker's rate governor
//!     let _ = frames.publish_now(frame, clock.as_ref());
//! });
//!
//! controller.start_worker(Box::new(model), None, config.timeouts.start())?;
//! controller.start_recording(config.timeouts.record());
//! // ...
//! controller.stop_recording(config.timeouts.record());
//! controller.save_pose("session/take1", config.timeouts.save());
//! controller.stop_worker();
//! ```

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame_buffer;
pub mod session;
pub mod stream;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use channel::{Command, CommandChannel, DisplayQueue};
pub use config::PoseConfig;
pub use controller::{PoseController, StopOutcome, WriterWorker};
pub use error::{PoseError, Result};
pub use frame_buffer::FrameBuffer;
pub use stream::{PoseSink, UdpPoseSink};
pub use types::{Clock, Frame, Keypoint, Pose, SystemClock};
pub use worker::{PoseModel, PostProcessor, RateMode};
