//! Core data types for posegate
//!
//! This module contains the fundamental data structures shared by the
//! capture side, the pose worker and the controller.
//!
//! # Main Types
//!
//! - [`Frame`] - A fixed-shape 3-channel pixel buffer
//! - [`Keypoint`] - One tracked landmark: id, position and confidence
//! - [`Pose`] - An ordered, index-stable set of keypoints for one frame
//! - [`Clock`] - Time source for capture and inference timestamps
//!
//! # Timestamps
//!
//! All timestamps are `f64` seconds. The capture subsystem and the worker
//! must stamp frames and inferences on the same [`Clock`] so the rate
//! governor can compare them.

use crate::error::{PoseError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of colour channels in a frame
pub const FRAME_CHANNELS: usize = 3;

/// A captured 3-channel frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved pixel data, `width * height * 3` bytes
    pixels: Vec<u8>,
}

impl Frame {
    /// Number of bytes a frame of this shape occupies
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * FRAME_CHANNELS
    }

    /// Create a frame, validating the pixel buffer length
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if pixels.len() != expected {
            return Err(PoseError::Frame {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create an all-black frame
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Raw pixel bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// A single tracked landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Body-part index, stable across frames
    pub id: usize,
    /// X coordinate in frame pixels
    pub x: f64,
    /// Y coordinate in frame pixels
    pub y: f64,
    /// Model confidence
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(id: usize, x: f64, y: f64, confidence: f64) -> Self {
        Self {
            id,
            x,
            y,
            confidence,
        }
    }
}

/// Ordered keypoints for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Create a pose from keypoints, keeping their order
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// Create a pose from `(x, y, confidence)` rows, using the row index as id
    pub fn from_rows(rows: &[(f64, f64, f64)]) -> Self {
        Self {
            keypoints: rows
                .iter()
                .enumerate()
                .map(|(id, &(x, y, c))| Keypoint::new(id, x, y, c))
                .collect(),
        }
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Return a copy with x and y multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            keypoints: self
                .keypoints
                .iter()
                .map(|kp| Keypoint::new(kp.id, kp.x * factor, kp.y * factor, kp.confidence))
                .collect(),
        }
    }
}

/// Time source for capture and inference timestamps
pub trait Clock: Send + Sync {
    /// Current time in seconds
    fn now(&self) -> f64;
}

/// Wall-clock seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A clock that only moves when told to
///
/// Used for replaying recorded sessions and for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, t: f64) {
        *self.now.lock() = t;
    }

    /// Move forward by `dt` seconds
    pub fn advance(&self, dt: f64) {
        *self.now.lock() += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shape_validation() {
        assert!(Frame::new(4, 2, vec![0; 24]).is_ok());
        let err = Frame::new(4, 2, vec![0; 23]).unwrap_err();
        assert!(matches!(
            err,
            PoseError::Frame {
                expected: 24,
                actual: 23
            }
        ));
    }

    #[test]
    fn test_blank_frame() {
        let frame = Frame::blank(3, 3);
        assert_eq!(frame.pixels().len(), 27);
        assert!(frame.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_pose_from_rows_assigns_ids() {
        let pose = Pose::from_rows(&[(1.0, 2.0, 0.9), (3.0, 4.0, 0.8)]);
        assert_eq!(pose.len(), 2);
        assert_eq!(pose.keypoints()[1], Keypoint::new(1, 3.0, 4.0, 0.8));
    }

    #[test]
    fn test_pose_scaled_keeps_confidence() {
        let pose = Pose::from_rows(&[(10.0, 20.0, 0.5)]).scaled(0.5);
        assert_eq!(pose.keypoints()[0], Keypoint::new(0, 5.0, 10.0, 0.5));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.now(), 1.5);
        clock.set(10.0);
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn test_system_clock_is_positive() {
        assert!(SystemClock.now() > 0.0);
    }
}
