//! Keypoint streaming sink
//!
//! Every processed frame becomes exactly one ASCII datagram sent to the
//! renderer. Delivery is best effort: no retry, no acknowledgment.
//!
//! # Wire Format
//!
//! ```text
//! 0,12.5,33.0;1,9.0,40.2;12.401;12.468;0.067
//! ^ id,x,y records       ^ previous capture; now; now - previous
//! ```
//!
//! # One-Frame Delay
//!
//! The capture timestamp carried by datagram N is the one that was current
//! *before* N's poses were computed. On every send the stored latest
//! timestamp moves to "previous" first, then the new one is stored.

use crate::config::StreamConfig;
use crate::error::{PoseError, Result};
use crate::types::{Clock, Pose};
use std::fmt::Write as _;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// Log a throughput milestone every this many datagrams
pub const MILESTONE_INTERVAL: u64 = 100;

/// Separator between records
const RECORD_SEP: char = ';';

/// Separator between fields of a keypoint record
const FIELD_SEP: char = ',';

/// Destination for processed poses
pub trait PoseSink: Send {
    /// Forward one pose computed from the frame captured at `capture_time`
    fn send(&mut self, pose: &Pose, capture_time: f64);

    /// Delivery counters, for sinks that keep them
    fn stats(&self) -> Option<SinkStats> {
        None
    }
}

/// Sink used when streaming is disabled
#[derive(Debug, Default)]
pub struct NullSink;

impl PoseSink for NullSink {
    fn send(&mut self, _pose: &Pose, _capture_time: f64) {}
}

/// Format a number the way the renderer expects (`33.0`, `12.5`)
fn push_number(buf: &mut String, value: f64) {
    let _ = write!(buf, "{:?}", value);
}

/// Stateful datagram builder holding the delayed capture timestamp
#[derive(Debug, Default, Clone)]
pub struct DatagramEncoder {
    previous_capture: f64,
    latest_capture: f64,
}

impl DatagramEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the payload for `pose`, shifting the capture timestamps
    pub fn encode(&mut self, pose: &Pose, capture_time: f64, now: f64) -> String {
        self.previous_capture = self.latest_capture;
        self.latest_capture = capture_time;

        let mut buf = String::with_capacity(pose.len() * 24 + 48);
        for kp in pose.keypoints() {
            let _ = write!(buf, "{}", kp.id);
            buf.push(FIELD_SEP);
            push_number(&mut buf, kp.x);
            buf.push(FIELD_SEP);
            push_number(&mut buf, kp.y);
            buf.push(RECORD_SEP);
        }
        push_number(&mut buf, self.previous_capture);
        buf.push(RECORD_SEP);
        push_number(&mut buf, now);
        buf.push(RECORD_SEP);
        push_number(&mut buf, now - self.previous_capture);
        buf
    }

    /// Capture timestamp the next datagram will carry
    pub fn pending_capture(&self) -> f64 {
        self.latest_capture
    }
}

/// Timestamps parsed from the tail of a datagram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatagramTimestamps {
    pub previous_capture: f64,
    pub sent_at: f64,
    pub age: f64,
}

/// Parse a datagram back into `(id, x, y)` records and its timestamps
///
/// Used by diagnostics and tests on the receiving side.
pub fn decode_datagram(payload: &str) -> Option<(Vec<(usize, f64, f64)>, DatagramTimestamps)> {
    let fields: Vec<&str> = payload.split(RECORD_SEP).collect();
    if fields.len() < 3 {
        return None;
    }
    let (records, tail) = fields.split_at(fields.len() - 3);
    let timestamps = DatagramTimestamps {
        previous_capture: tail[0].parse().ok()?,
        sent_at: tail[1].parse().ok()?,
        age: tail[2].parse().ok()?,
    };
    let mut keypoints = Vec::with_capacity(records.len());
    for record in records {
        let mut parts = record.split(FIELD_SEP);
        let id = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        keypoints.push((id, x, y));
    }
    Some((keypoints, timestamps))
}

/// Send statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Datagrams handed to the socket successfully
    pub sent: u64,
    /// Datagrams the socket rejected
    pub failed: u64,
}

/// Fire-and-forget UDP sink
pub struct UdpPoseSink {
    socket: UdpSocket,
    destination: SocketAddr,
    encoder: DatagramEncoder,
    clock: Arc<dyn Clock>,
    count: u64,
    stats: SinkStats,
}

impl UdpPoseSink {
    /// Bind an ephemeral socket aimed at the configured destination
    pub fn new(config: &StreamConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let destination = config.socket_addr()?;
        let bind_addr = if destination.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| PoseError::Stream(format!("Failed to bind socket: {}", e)))?;
        socket
            .set_write_timeout(Some(config.send_timeout()))
            .map_err(|e| PoseError::Stream(format!("Failed to set send timeout: {}", e)))?;

        tracing::info!("Streaming keypoints to {}", destination);
        Ok(Self {
            socket,
            destination,
            encoder: DatagramEncoder::new(),
            clock,
            count: 0,
            stats: SinkStats::default(),
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl PoseSink for UdpPoseSink {
    fn send(&mut self, pose: &Pose, capture_time: f64) {
        let payload = self.encoder.encode(pose, capture_time, self.clock.now());

        self.count += 1;
        if self.count % MILESTONE_INTERVAL == 0 {
            tracing::info!("{} packets sent to renderer", self.count);
        }

        match self.socket.send_to(payload.as_bytes(), self.destination) {
            Ok(_) => self.stats.sent += 1,
            Err(e) => {
                self.stats.failed += 1;
                tracing::debug!("Datagram to {} dropped: {}", self.destination, e);
            }
        }
    }

    fn stats(&self) -> Option<SinkStats> {
        Some(self.stats)
    }
}
