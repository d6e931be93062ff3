//! In-memory pose history accumulated while persistence is enabled

use crate::types::Pose;
use chrono::{DateTime, Utc};

/// Poses with their inference and capture timestamps
///
/// The three sequences are only ever pushed together, so they always have
/// the same length.
#[derive(Debug, Default)]
pub struct PoseHistory {
    poses: Vec<Pose>,
    pose_times: Vec<f64>,
    frame_times: Vec<f64>,
    /// Wall-clock time of the first entry since the last clear
    started_at: Option<DateTime<Utc>>,
}

impl PoseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one processed frame
    pub fn push(&mut self, pose: Pose, pose_time: f64, frame_time: f64) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.poses.push(pose);
        self.pose_times.push(pose_time);
        self.frame_times.push(frame_time);
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Inference completion times
    pub fn pose_times(&self) -> &[f64] {
        &self.pose_times
    }

    /// Capture timestamps of the processed frames
    pub fn frame_times(&self) -> &[f64] {
        &self.frame_times
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Log-friendly description, e.g. `3 poses recorded since 12:04:05 UTC`
    pub fn summary(&self) -> String {
        match self.started_at {
            Some(started) => format!(
                "{} poses recorded since {}",
                self.len(),
                started.format("%H:%M:%S UTC")
            ),
            None => format!("{} poses", self.len()),
        }
    }

    /// Iterate `(pose, frame_time, pose_time)` rows
    pub fn rows(&self) -> impl Iterator<Item = (&Pose, f64, f64)> + '_ {
        self.poses
            .iter()
            .zip(self.frame_times.iter().copied())
            .zip(self.pose_times.iter().copied())
            .map(|((pose, frame_time), pose_time)| (pose, frame_time, pose_time))
    }

    pub fn clear(&mut self) {
        self.poses.clear();
        self.pose_times.clear();
        self.frame_times.clear();
        self.started_at = None;
    }
}
