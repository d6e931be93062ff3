//! Shared single-slot frame buffer
//!
//! The capture side publishes the latest frame and its capture timestamp;
//! the pose worker reads whatever is newest. There is no queue of pending
//! frames, only the slot.
//!
//! Pixels and timestamp are not read as one transaction. `publish` swaps the
//! pixels in first and then stores the timestamp, so a reader that sees a new
//! timestamp always sees pixels at least that new. A reader may however pick
//! up pixels that are one frame newer than the timestamp it loaded; this is
//! tolerated, only timestamp freshness is checked.

use crate::error::{PoseError, Result};
use crate::types::{Clock, Frame};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sentinel bit pattern meaning "nothing published yet"
const EMPTY: u64 = u64::MAX;

/// A read-only view of the latest frame
#[derive(Debug, Clone)]
pub struct FrameView {
    /// Frame pixels
    pub frame: Arc<Frame>,
    /// Capture timestamp in seconds
    pub capture_time: f64,
}

/// Latest-value cell shared between capture and the pose worker
#[derive(Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: RwLock<Option<Arc<Frame>>>,
    capture_time: AtomicU64,
}

impl FrameBuffer {
    /// Create an empty buffer for frames of a fixed shape
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: RwLock::new(None),
            capture_time: AtomicU64::new(EMPTY),
        }
    }

    /// Frame shape as `(width, height)`
    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Publish a new frame; called by the capture side only
    pub fn publish(&self, frame: Frame, capture_time: f64) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(PoseError::Frame {
                expected: Frame::byte_len(self.width, self.height),
                actual: frame.pixels().len(),
            });
        }
        *self.pixels.write() = Some(Arc::new(frame));
        self.capture_time
            .store(capture_time.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Publish raw pixel bytes with the buffer's shape
    pub fn publish_pixels(&self, pixels: Vec<u8>, capture_time: f64) -> Result<()> {
        let frame = Frame::new(self.width, self.height, pixels)?;
        self.publish(frame, capture_time)
    }

    /// Publish stamped with `clock`, the same clock the worker's rate
    /// governor reads; returns the timestamp used
    pub fn publish_now(&self, frame: Frame, clock: &dyn Clock) -> Result<f64> {
        let capture_time = clock.now();
        self.publish(frame, capture_time)?;
        Ok(capture_time)
    }

    /// Capture timestamp of the latest frame, if any was published
    pub fn capture_time(&self) -> Option<f64> {
        match self.capture_time.load(Ordering::Acquire) {
            EMPTY => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Latest frame and its timestamp; never blocks on the capture side for long
    pub fn latest(&self) -> Option<FrameView> {
        let capture_time = self.capture_time()?;
        let frame = self.pixels.read().clone()?;
        Some(FrameView {
            frame,
            capture_time,
        })
    }
}
