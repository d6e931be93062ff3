//! Posegate - Demo Session
//!
//! Runs a short, self-contained session: a synthetic camera publishes
//! frames, a demo model turns them into poses, and the controller records
//! a few seconds before saving and shutting the worker down.
//!
//! Usage: `posegate [config.toml]`

use anyhow::Context;
use posegate::{
    config::default_config_path, Clock, Frame, PoseConfig, PoseController, PoseModel, Pose,
    SystemClock, WriterWorker,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;
const CAPTURE_INTERVAL: Duration = Duration::from_millis(33);
const RECORD_DURATION: Duration = Duration::from_secs(3);

const DEMO_KEYPOINTS: [&str; 5] = ["nose", "left_wrist", "right_wrist", "left_ankle", "right_ankle"];

/// Moves a fixed skeleton in a circle based on the capture time
struct DemoModel;

impl PoseModel for DemoModel {
    fn init(&mut self, frame: &Frame, _capture_time: f64) -> posegate::Result<bool> {
        Ok(frame.width > 0 && frame.height > 0)
    }

    fn infer(&mut self, frame: &Frame, capture_time: f64) -> posegate::Result<Pose> {
        let cx = frame.width as f64 / 2.0 + 5.0 * capture_time.cos();
        let cy = frame.height as f64 / 2.0 + 5.0 * capture_time.sin();
        Ok(Pose::from_rows(&[
            (cx, cy - 10.0, 0.95),
            (cx - 8.0, cy, 0.9),
            (cx + 8.0, cy, 0.9),
            (cx - 4.0, cy + 15.0, 0.8),
            (cx + 4.0, cy + 15.0, 0.8),
        ]))
    }

    fn keypoint_names(&self) -> Vec<String> {
        DEMO_KEYPOINTS.iter().map(|s| s.to_string()).collect()
    }
}

/// Stand-in for the video writer; always alive, confirms every request
struct DemoWriter;

impl WriterWorker for DemoWriter {
    fn is_alive(&self) -> bool {
        true
    }

    fn start_record(&mut self, _timeout: Duration) -> bool {
        tracing::info!("Demo writer recording");
        true
    }

    fn stop_record(&mut self, _timeout: Duration) -> bool {
        tracing::info!("Demo writer stopped");
        true
    }
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => PoseConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PoseConfig::load_or_default(default_config_path().as_deref()),
    };

    // Keep the appender guard alive until exit so buffered lines are flushed
    let (file_layer, _guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "posegate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,posegate=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting posegate demo session ({})", config.rate_mode);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut controller = PoseController::new(config.clone(), FRAME_WIDTH, FRAME_HEIGHT)
        .with_clock(clock.clone())
        .with_writer(Box::new(DemoWriter));

    let running = Arc::new(AtomicBool::new(true));
    let capture = {
        let frames = controller.frames();
        let running = running.clone();
        std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let mut shade = 0u8;
                while running.load(Ordering::Relaxed) {
                    shade = shade.wrapping_add(1);
                    let pixels = vec![shade; Frame::byte_len(FRAME_WIDTH, FRAME_HEIGHT)];
                    let published = Frame::new(FRAME_WIDTH, FRAME_HEIGHT, pixels)
                        .and_then(|frame| frames.publish_now(frame, clock.as_ref()));
                    if let Err(e) = published {
                        tracing::error!("Capture failed: {}", e);
                        break;
                    }
                    std::thread::sleep(CAPTURE_INTERVAL);
                }
            })
            .context("spawning capture thread")?
    };

    // The model initializes on the first frame
    std::thread::sleep(CAPTURE_INTERVAL * 2);
    let ready = controller.start_worker(Box::new(DemoModel), None, config.timeouts.start())?;
    if !ready {
        tracing::warn!("Pose model not ready, poses will not be produced");
    }

    if controller.start_recording(config.timeouts.record()) {
        tracing::info!("Recording for {:?}", RECORD_DURATION);
        std::thread::sleep(RECORD_DURATION);
    } else {
        tracing::warn!("Recording did not start");
    }
    if !controller.stop_recording(config.timeouts.record()) {
        tracing::warn!("Recording did not stop cleanly");
    }

    if let Some(pose) = controller.display_pose() {
        tracing::info!("Last displayed pose has {} keypoints", pose.len());
    }

    let prefix = PathBuf::from(format!(
        "posegate_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    if controller.save_pose(&prefix, config.timeouts.save()) {
        tracing::info!("Saved poses under {}", prefix.display());
    } else {
        tracing::warn!("Poses were not saved");
    }

    let outcome = controller.stop_worker();
    running.store(false, Ordering::Relaxed);
    if capture.join().is_err() {
        tracing::error!("Capture thread panicked");
    }

    tracing::info!("Session finished: {:?}", outcome);
    if !outcome.is_success() {
        anyhow::bail!("pose worker did not stop cleanly ({:?})", outcome);
    }
    Ok(())
}
