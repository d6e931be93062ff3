//! Duplex command channel
//!
//! Two bounded FIFO queues, "to-worker" and "from-worker". Both ends of the
//! link hold both queues, so any consumer can put a command back onto the
//! queue it read it from. That is how the routing contract is kept: a
//! consumer that reads a command meant for someone else re-enqueues it
//! unchanged.

use super::command::Command;
use crate::error::{PoseError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Default capacity of each direction
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How long a write may wait for room in a full queue
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Wait granularity while polling for a reply
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What a reply waiter does with a command it has read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// This is the reply being waited for
    Accept,
    /// Belongs to another consumer; put it back
    Requeue,
    /// Stale reply nobody will claim; drop it
    Discard,
}

/// One direction of the command channel
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    write_timeout: Duration,
}

impl CommandQueue {
    fn with_capacity(capacity: usize, write_timeout: Duration) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            write_timeout,
        }
    }

    /// Enqueue a command, waiting at most the write timeout for room
    pub fn write(&self, cmd: Command) -> Result<()> {
        self.tx
            .send_timeout(cmd, self.write_timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(cmd) => {
                    PoseError::Channel(format!("queue full, dropped {}", cmd))
                }
                SendTimeoutError::Disconnected(cmd) => {
                    PoseError::Channel(format!("queue closed, dropped {}", cmd))
                }
            })
    }

    /// Take the next command without blocking
    pub fn read(&self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Take the next command, waiting at most `timeout`
    pub fn read_timeout(&self, timeout: Duration) -> Option<Command> {
        match self.rx.recv_timeout(timeout) {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Remove and return everything queued
    pub fn drain(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(cmd) = self.rx.try_recv() {
            commands.push(cmd);
        }
        commands
    }

    /// Wait for a command that `route` accepts, until `timeout` elapses
    ///
    /// Commands routed to [`Route::Requeue`] are written back to this queue.
    pub fn wait_for<F>(&self, timeout: Duration, route: F) -> Option<Command>
    where
        F: FnMut(&Command) -> Route,
    {
        let deadline = Instant::now() + timeout;
        self.wait_until(route, || Instant::now() < deadline)
    }

    /// Wait for a command that `route` accepts for as long as `keep_waiting` holds
    pub fn wait_while<F, K>(&self, route: F, keep_waiting: K) -> Option<Command>
    where
        F: FnMut(&Command) -> Route,
        K: FnMut() -> bool,
    {
        self.wait_until(route, keep_waiting)
    }

    fn wait_until<F, K>(&self, mut route: F, mut keep_waiting: K) -> Option<Command>
    where
        F: FnMut(&Command) -> Route,
        K: FnMut() -> bool,
    {
        while keep_waiting() {
            let Some(cmd) = self.read_timeout(REPLY_POLL_INTERVAL) else {
                continue;
            };
            match route(&cmd) {
                Route::Accept => return Some(cmd),
                Route::Discard => {
                    tracing::debug!("Discarding stale reply {}", cmd);
                }
                Route::Requeue => {
                    if let Err(e) = self.write(cmd) {
                        tracing::warn!("Failed to re-route command: {}", e);
                    }
                    // Give the rightful consumer a chance to claim it
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
        None
    }
}

/// The bidirectional link between a controller and its workers
#[derive(Debug, Clone)]
pub struct CommandChannel {
    to_worker: CommandQueue,
    from_worker: CommandQueue,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl CommandChannel {
    /// Create a channel with `capacity` slots per direction
    pub fn new(capacity: usize) -> Self {
        Self::with_write_timeout(capacity, DEFAULT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(capacity: usize, write_timeout: Duration) -> Self {
        Self {
            to_worker: CommandQueue::with_capacity(capacity, write_timeout),
            from_worker: CommandQueue::with_capacity(capacity, write_timeout),
        }
    }

    /// Queue carrying controller requests to workers
    pub fn to_worker(&self) -> &CommandQueue {
        &self.to_worker
    }

    /// Queue carrying worker replies to the controller
    pub fn from_worker(&self) -> &CommandQueue {
        &self.from_worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::command::{Domain, Verb};

    #[test]
    fn test_fifo_per_direction() {
        let channel = CommandChannel::new(8);
        channel.to_worker().write(Command::pose_write(true)).unwrap();
        channel.to_worker().write(Command::pose_end()).unwrap();
        channel.from_worker().write(Command::pose_start(true)).unwrap();

        assert_eq!(channel.to_worker().read(), Some(Command::pose_write(true)));
        assert_eq!(channel.to_worker().read(), Some(Command::pose_end()));
        assert_eq!(channel.to_worker().read(), None);
        assert_eq!(channel.from_worker().len(), 1);
    }

    #[test]
    fn test_clones_share_queues() {
        let controller = CommandChannel::new(4);
        let worker = controller.clone();
        controller.to_worker().write(Command::pose_end()).unwrap();
        assert_eq!(worker.to_worker().read(), Some(Command::pose_end()));
    }

    #[test]
    fn test_full_queue_write_fails() {
        let channel = CommandChannel::with_write_timeout(1, Duration::from_millis(10));
        channel.to_worker().write(Command::pose_end()).unwrap();
        let err = channel.to_worker().write(Command::pose_end()).unwrap_err();
        assert!(matches!(err, PoseError::Channel(_)));
    }

    #[test]
    fn test_wait_for_requeues_foreign() {
        let channel = CommandChannel::new(8);
        let foreign = Command::new("writer", "write", vec![]);
        channel.from_worker().write(foreign.clone()).unwrap();
        channel.from_worker().write(Command::pose_write(true)).unwrap();

        let reply = channel
            .from_worker()
            .wait_for(Duration::from_millis(200), |cmd| {
                if cmd.is(&Domain::Pose, &Verb::Write) {
                    Route::Accept
                } else {
                    Route::Requeue
                }
            });

        assert_eq!(reply, Some(Command::pose_write(true)));
        assert_eq!(channel.from_worker().drain(), vec![foreign]);
    }

    #[test]
    fn test_wait_for_times_out() {
        let channel = CommandChannel::new(8);
        let start = Instant::now();
        let reply = channel
            .from_worker()
            .wait_for(Duration::from_millis(30), |_| Route::Accept);
        assert!(reply.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_discards_stale() {
        let channel = CommandChannel::new(8);
        channel.from_worker().write(Command::pose_write(false)).unwrap();
        channel.from_worker().write(Command::pose_end()).unwrap();

        let reply = channel.from_worker().wait_while(
            |cmd| {
                if cmd.is(&Domain::Pose, &Verb::End) {
                    Route::Accept
                } else {
                    Route::Discard
                }
            },
            || true,
        );
        assert_eq!(reply, Some(Command::pose_end()));
        assert!(channel.from_worker().is_empty());
    }
}
