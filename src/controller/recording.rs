//! Recording coordination across the pose and writer workers
//!
//! The writer is asked first; its answer is the provisional result. The
//! pose worker is only toggled when both workers are alive, and then its
//! acknowledgment decides the result. A missing acknowledgment keeps the
//! provisional result.

use super::writer::WriterWorker;
use crate::channel::{Command, CommandChannel, Domain, Route, Verb};
use std::time::Duration;

/// Toggle pose recording and wait for the acknowledged state
///
/// Returns `None` when the request could not be sent or no acknowledgment
/// arrived within `timeout`. Write acknowledgments for the opposite state are
/// left over from earlier timed-out requests and are discarded.
pub fn request_write(channel: &CommandChannel, enabled: bool, timeout: Duration) -> Option<bool> {
    if let Err(e) = channel.to_worker().write(Command::pose_write(enabled)) {
        tracing::warn!("Failed to request pose recording: {}", e);
        return None;
    }

    let reply = channel.from_worker().wait_for(timeout, |cmd| {
        if !cmd.is(&Domain::Pose, &Verb::Write) {
            Route::Requeue
        } else if cmd.flag(0) == Some(enabled) {
            Route::Accept
        } else {
            Route::Discard
        }
    });
    match reply {
        Some(cmd) => cmd.flag(0),
        None => {
            tracing::warn!("No acknowledgment for (pose,write,{}) within {:?}", enabled, timeout);
            None
        }
    }
}

/// Start recording on the writer, then on the pose worker
pub fn start_recording(
    channel: &CommandChannel,
    pose_alive: bool,
    writer: Option<&mut dyn WriterWorker>,
    timeout: Duration,
) -> bool {
    let Some(writer) = writer else {
        tracing::warn!("No writer worker attached, not recording");
        return false;
    };
    let provisional = writer.start_record(timeout);

    if !(pose_alive && writer.is_alive()) {
        return provisional;
    }
    request_write(channel, true, timeout).unwrap_or(provisional)
}

/// Stop recording on the writer, then on the pose worker
///
/// Success means the pose worker acknowledged recording as off.
pub fn stop_recording(
    channel: &CommandChannel,
    pose_alive: bool,
    writer: Option<&mut dyn WriterWorker>,
    timeout: Duration,
) -> bool {
    let Some(writer) = writer else {
        tracing::warn!("No writer worker attached");
        return false;
    };
    let provisional = writer.stop_record(timeout);

    if !(pose_alive && writer.is_alive()) {
        return provisional;
    }
    request_write(channel, false, timeout)
        .map(|recording| !recording)
        .unwrap_or(provisional)
}
