//! Mock construction helpers

use mockall::mock;
use parking_lot::Mutex;
use posegate::{Frame, Pose, PoseError, PoseModel, PostProcessor, WriterWorker};
use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Keypoints every [`FixedPoseModel`] pose carries, as `(x, y, confidence)`
pub const FIXED_ROWS: [(f64, f64, f64); 3] = [(1.0, 2.0, 0.9), (3.0, 4.0, 0.8), (5.0, 6.0, 0.7)];

mock! {
    pub Writer {}

    impl WriterWorker for Writer {
        fn is_alive(&self) -> bool;
        fn start_record(&mut self, timeout: Duration) -> bool;
        fn stop_record(&mut self, timeout: Duration) -> bool;
    }
}

/// A writer that is alive and confirms every request
pub fn agreeable_writer() -> MockWriter {
    let mut writer = MockWriter::new();
    writer.expect_is_alive().return_const(true);
    writer.expect_start_record().return_const(true);
    writer.expect_stop_record().return_const(true);
    writer
}

/// Returns the same three keypoints for every frame
///
/// Capture times of processed frames are collected in `calls`.
#[derive(Clone, Default)]
pub struct FixedPoseModel {
    pub calls: Arc<Mutex<Vec<f64>>>,
    /// Fail inference on the frame captured at this time
    pub fail_on: Option<f64>,
    /// Refuse to initialize
    pub not_ready: bool,
    /// Sleep this long when the worker drops the model
    pub drop_delay: Option<Duration>,
    /// Sleep this long inside every inference
    pub infer_delay: Option<Duration>,
}

impl FixedPoseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, capture_time: f64) -> Self {
        self.fail_on = Some(capture_time);
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    pub fn slow_drop(mut self, delay: Duration) -> Self {
        self.drop_delay = Some(delay);
        self
    }

    pub fn slow_infer(mut self, delay: Duration) -> Self {
        self.infer_delay = Some(delay);
        self
    }

    pub fn processed(&self) -> Vec<f64> {
        self.calls.lock().clone()
    }
}

impl PoseModel for FixedPoseModel {
    fn init(&mut self, _frame: &Frame, _capture_time: f64) -> posegate::Result<bool> {
        Ok(!self.not_ready)
    }

    fn infer(&mut self, _frame: &Frame, capture_time: f64) -> posegate::Result<Pose> {
        if let Some(delay) = self.infer_delay {
            std::thread::sleep(delay);
        }
        if self.fail_on == Some(capture_time) {
            return Err(PoseError::Inference("out of memory".into()));
        }
        self.calls.lock().push(capture_time);
        Ok(Pose::from_rows(&FIXED_ROWS))
    }

    fn keypoint_names(&self) -> Vec<String> {
        vec!["nose".into(), "left_eye".into(), "right_eye".into()]
    }
}

impl Drop for FixedPoseModel {
    fn drop(&mut self) {
        if let Some(delay) = self.drop_delay {
            std::thread::sleep(delay);
        }
    }
}

/// Post-processor that writes a marker file and records where
#[derive(Clone, Default)]
pub struct MarkerProcessor {
    pub saved: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

impl PostProcessor for MarkerProcessor {
    fn save(&mut self, path: &Path) -> posegate::Result<()> {
        if self.fail {
            return Err(PoseError::Persist("processor state unavailable".into()));
        }
        std::fs::write(path, b"processed")?;
        self.saved.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Bind a receiver on an ephemeral loopback port
pub fn udp_receiver() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .expect("set read timeout");
    let addr = socket.local_addr().expect("receiver address");
    (socket, addr)
}

/// Receive every datagram that arrives before the read timeout
pub fn receive_all(socket: &UdpSocket) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut buf = [0u8; 2048];
    while let Ok(len) = socket.recv(&mut buf) {
        datagrams.push(String::from_utf8_lossy(&buf[..len]).into_owned());
    }
    datagrams
}
