//! Test data builders for creating test objects

use posegate::types::ManualClock;
use posegate::{Frame, PoseConfig, PoseController, RateMode};
use std::net::SocketAddr;
use std::sync::Arc;

pub const TEST_WIDTH: u32 = 4;
pub const TEST_HEIGHT: u32 = 3;

/// Builder for controllers wired to a manual clock
pub struct ControllerBuilder {
    config: PoseConfig,
    clock: Arc<ManualClock>,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        let mut config = PoseConfig::default();
        config.stream.enabled = false;
        config.idle_poll_ms = 1;
        config.rate_mode = RateMode::MatchCapture;
        config.timeouts.join_grace_secs = 2.0;
        Self {
            config,
            clock: Arc::new(ManualClock::new(0.0)),
        }
    }

    pub fn rate_mode(mut self, mode: RateMode) -> Self {
        self.config.rate_mode = mode;
        self
    }

    pub fn stream_to(mut self, destination: SocketAddr) -> Self {
        self.config.stream.enabled = true;
        self.config.stream.destination = destination.to_string();
        self
    }

    pub fn join_grace_secs(mut self, secs: f64) -> Self {
        self.config.timeouts.join_grace_secs = secs;
        self
    }

    pub fn display_resize(mut self, factor: f64) -> Self {
        self.config.display_resize = factor;
        self
    }

    pub fn build(self) -> (PoseController, Arc<ManualClock>) {
        let controller = PoseController::new(self.config, TEST_WIDTH, TEST_HEIGHT)
            .with_clock(self.clock.clone());
        (controller, self.clock)
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Set the clock to `t` and publish a blank frame captured at `t`
pub fn publish_at(controller: &PoseController, clock: &ManualClock, t: f64) {
    clock.set(t);
    controller
        .frames()
        .publish(Frame::blank(TEST_WIDTH, TEST_HEIGHT), t)
        .expect("test frame has the buffer shape");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_builder_defaults() {
        let (controller, _clock) = ControllerBuilder::new().build();
        assert!(!controller.config().stream.enabled);
        assert_eq!(controller.config().rate_mode, RateMode::MatchCapture);
        assert_eq!(controller.frames().shape(), (TEST_WIDTH, TEST_HEIGHT));
    }
}
