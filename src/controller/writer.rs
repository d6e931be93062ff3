//! Video writer worker seam
//!
//! The writer that encodes frames to a video file is an external
//! collaborator. Recording is synchronized across it and the pose worker,
//! so the controller needs to start, stop and query it.

use std::time::Duration;

/// Handle to the video writer worker
#[cfg_attr(test, mockall::automock)]
pub trait WriterWorker: Send {
    /// Whether the writer is running
    fn is_alive(&self) -> bool;

    /// Ask the writer to start writing frames; `true` once confirmed
    fn start_record(&mut self, timeout: Duration) -> bool;

    /// Ask the writer to stop writing frames; `true` once confirmed
    fn stop_record(&mut self, timeout: Duration) -> bool;
}
