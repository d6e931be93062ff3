//! Pose worker
//!
//! The worker runs on its own thread and owns the model, the streaming sink
//! and the recording state. It talks to the controller only through the
//! shared frame buffer and the command channel.
//!
//! # Components
//!
//! - [`RateGovernor`] - Per-iteration inference gate
//! - [`PoseWorker`] - The loop state machine
//! - [`PoseModel`] / [`PostProcessor`] - Seams to the external estimator

pub mod governor;
pub mod model;
pub mod pose_loop;

pub use governor::{RateGovernor, RateMode};
pub use model::{keypoint_label, PoseModel, PostProcessor};
pub use pose_loop::{PoseWorker, WorkerLinks, WorkerState, WorkerStats};
