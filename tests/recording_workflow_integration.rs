//! Integration tests for recording and saving
//!
//! These tests validate the complete recording workflow:
//! - Coordinated start/stop with the writer worker
//! - History persisted as a pose table
//! - Post-processor output next to the table

mod common;

use common::builders::{publish_at, ControllerBuilder};
use common::mock_helpers::{agreeable_writer, FixedPoseModel, MarkerProcessor, MockWriter};
use common::{test_timeout, wait_until, worker_deadline};
use posegate::session::{pose_table_path, processor_path};
use posegate::types::ManualClock;
use posegate::{PoseController, StopOutcome};
use std::sync::Arc;
use std::time::Duration;

type Session = (PoseController, FixedPoseModel, Arc<ManualClock>);

fn record_frames(
    controller: &PoseController,
    clock: &ManualClock,
    model: &FixedPoseModel,
    times: &[f64],
) {
    for &t in times {
        let before = model.processed().len();
        publish_at(controller, clock, t);
        assert!(
            wait_until(worker_deadline(), || model.processed().len() > before),
            "frame {} was not processed",
            t
        );
    }
}

fn started(writer: MockWriter) -> Session {
    let (controller, clock) = ControllerBuilder::new().build();
    let mut controller = controller.with_writer(Box::new(writer));
    publish_at(&controller, &clock, 1.0);
    let model = FixedPoseModel::new();
    assert!(controller
        .start_worker(
            Box::new(model.clone()),
            Some(Box::new(MarkerProcessor::default())),
            worker_deadline()
        )
        .unwrap());
    assert!(wait_until(worker_deadline(), || model.processed() == vec![1.0]));
    (controller, model, clock)
}

#[test]
fn test_record_save_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("take1");
    let (mut controller, model, clock) = started(agreeable_writer());

    assert!(controller.start_recording(worker_deadline()));
    record_frames(&controller, &clock, &model, &[2.0, 3.0, 4.0]);
    assert!(controller.stop_recording(worker_deadline()));

    // Frames after recording stopped are not kept
    record_frames(&controller, &clock, &model, &[5.0]);

    assert!(controller.save_pose(&prefix, worker_deadline()));
    let mut reader = csv::Reader::from_path(pose_table_path(&prefix)).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("nose_x"));
    assert_eq!(headers.get(9), Some("frame_time"));
    assert_eq!(headers.get(10), Some("pose_time"));

    let frame_times: Vec<f64> = reader
        .records()
        .map(|r| r.unwrap().get(9).unwrap().parse().unwrap())
        .collect();
    assert_eq!(frame_times, vec![2.0, 3.0, 4.0]);
    assert!(processor_path(&prefix).exists());

    // History was cleared by the successful save
    let second = dir.path().join("take2");
    assert!(!controller.save_pose(&second, worker_deadline()));
    assert!(!pose_table_path(&second).exists());

    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}

#[test]
fn test_save_with_empty_history_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _model, _clock) = started(agreeable_writer());

    assert!(!controller.save_pose(dir.path().join("empty"), worker_deadline()));
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}

#[test]
fn test_recording_without_writer_is_refused() {
    let (mut controller, clock) = ControllerBuilder::new().build();
    publish_at(&controller, &clock, 1.0);
    controller
        .start_worker(Box::new(FixedPoseModel::new()), None, worker_deadline())
        .unwrap();

    assert!(!controller.start_recording(test_timeout()));
    assert!(controller.channel().to_worker().is_empty());
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}

#[test]
fn test_dead_writer_leaves_pose_worker_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = MockWriter::new();
    writer.expect_is_alive().return_const(false);
    writer.expect_start_record().times(1).return_const(true);
    writer.expect_stop_record().times(0);
    let (mut controller, model, clock) = started(writer);

    // The writer's answer stands when the pose worker is not asked
    assert!(controller.start_recording(test_timeout()));
    record_frames(&controller, &clock, &model, &[2.0]);

    assert!(!controller.save_pose(dir.path().join("none"), worker_deadline()));
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}

#[test]
fn test_writer_refusal_overridden_by_pose_ack() {
    let mut writer = MockWriter::new();
    writer.expect_is_alive().return_const(true);
    writer
        .expect_start_record()
        .withf(|timeout| *timeout == Duration::from_secs(1))
        .return_const(false);
    let (mut controller, _model, _clock) = started(writer);

    assert!(controller.start_recording(Duration::from_secs(1)));
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}

#[test]
fn test_recording_after_worker_stopped() {
    let (mut controller, _model, _clock) = started(agreeable_writer());
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);

    // Only the writer is toggled; its answer is returned
    assert!(controller.start_recording(test_timeout()));
    assert!(controller.stop_recording(test_timeout()));
    assert!(controller.channel().to_worker().is_empty());
    assert!(!controller.save_pose("unused", test_timeout()));
}

#[test]
fn test_processor_failure_does_not_block_table() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("take");
    let (controller, clock) = ControllerBuilder::new().build();
    let mut controller = controller.with_writer(Box::new(agreeable_writer()));
    publish_at(&controller, &clock, 1.0);

    let model = FixedPoseModel::new();
    let processor = MarkerProcessor {
        fail: true,
        ..Default::default()
    };
    controller
        .start_worker(
            Box::new(model.clone()),
            Some(Box::new(processor)),
            worker_deadline(),
        )
        .unwrap();
    assert!(wait_until(worker_deadline(), || model.processed() == vec![1.0]));

    assert!(controller.start_recording(worker_deadline()));
    record_frames(&controller, &clock, &model, &[2.0, 3.0]);

    assert!(controller.save_pose(&prefix, worker_deadline()));
    assert!(pose_table_path(&prefix).exists());
    assert!(!processor_path(&prefix).exists());
    assert_eq!(controller.stop_worker(), StopOutcome::Graceful);
}
