//! Rate governor
//!
//! The frame buffer only ever holds the latest frame, so there is no backlog
//! to drain. Each loop iteration the governor decides whether the frame
//! currently in the slot deserves an inference.
//!
//! # Modes
//!
//! - [`RateMode::OptimizeRate`] - compare against the start of the previous
//!   inference. A frame captured before the model last started is already
//!   stale and gets skipped, so throughput follows the model, never the
//!   camera.
//! - [`RateMode::MatchCapture`] - compare against the last processed capture
//!   timestamp. Every distinct frame that is still in the slot when the worker
//!   looks is processed.
//!
//! Neither mode ever runs inference twice on the same capture timestamp.
//!
//! `OptimizeRate` compares capture timestamps with readings of the worker's
//! [`Clock`](crate::types::Clock), so capture must stamp frames with that same
//! clock. [`RateGovernor::clock_skewed`] flags frames that clearly were not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capture timestamps further than this from the worker clock were taken
/// with another time base
pub const CLOCK_SKEW_LIMIT_SECS: f64 = 60.0;

/// Inference pacing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// Skip frames that arrive faster than the model runs
    #[default]
    OptimizeRate,
    /// Process every distinct frame
    MatchCapture,
}

impl RateMode {
    /// Controller-facing label
    pub fn label(&self) -> &'static str {
        match self {
            RateMode::OptimizeRate => "Optimize Rate",
            RateMode::MatchCapture => "Match Capture",
        }
    }
}

impl fmt::Display for RateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "optimize rate" => Ok(RateMode::OptimizeRate),
            "match capture" => Ok(RateMode::MatchCapture),
            other => Err(format!("unknown rate mode: {}", other)),
        }
    }
}

/// Per-iteration inference gate
#[derive(Debug, Clone)]
pub struct RateGovernor {
    mode: RateMode,
    /// Capture timestamp of the last processed frame
    last_frame_time: Option<f64>,
    /// Clock time at which the last inference started
    last_inference_start: Option<f64>,
}

impl RateGovernor {
    pub fn new(mode: RateMode) -> Self {
        Self {
            mode,
            last_frame_time: None,
            last_inference_start: None,
        }
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// Reference time a new frame must be strictly newer than
    pub fn reference(&self) -> Option<f64> {
        match self.mode {
            RateMode::OptimizeRate => self.last_inference_start,
            RateMode::MatchCapture => self.last_frame_time,
        }
    }

    /// Whether a frame captured at `capture_time` should be processed
    pub fn should_process(&self, capture_time: Option<f64>) -> bool {
        let Some(capture_time) = capture_time else {
            return false;
        };
        // Never process the same frame twice, whatever the mode
        if let Some(last) = self.last_frame_time {
            if capture_time <= last {
                return false;
            }
        }
        match self.reference() {
            Some(reference) => capture_time > reference,
            None => true,
        }
    }

    /// Note that inference on `capture_time` started at `started_at`
    pub fn record_start(&mut self, capture_time: f64, started_at: f64) {
        self.last_frame_time = Some(capture_time);
        self.last_inference_start = Some(started_at);
    }

    /// Whether a frame stamped `capture_time` and read at clock time `now`
    /// came from a different clock; only matters when comparing against
    /// inference starts
    pub fn clock_skewed(&self, capture_time: f64, now: f64) -> bool {
        self.mode == RateMode::OptimizeRate
            && (now - capture_time).abs() > CLOCK_SKEW_LIMIT_SECS
    }

    pub fn last_frame_time(&self) -> Option<f64> {
        self.last_frame_time
    }

    pub fn last_inference_start(&self) -> Option<f64> {
        self.last_inference_start
    }
}
