//! Pose model seams
//!
//! The pose estimator and its optional post-processor are external
//! collaborators. The worker only sees them through these traits, which
//! keeps real models and test stubs interchangeable.

use crate::error::Result;
use crate::types::{Frame, Pose};
use std::path::Path;

/// A pose-estimation model
///
/// Both calls may be slow; no upper bound is assumed.
pub trait PoseModel: Send {
    /// Prepare the model using a first frame; `Ok(false)` means not ready
    fn init(&mut self, frame: &Frame, capture_time: f64) -> Result<bool>;

    /// Estimate the pose on one frame
    fn infer(&mut self, frame: &Frame, capture_time: f64) -> Result<Pose>;

    /// Body-part names, index-aligned with the keypoints of every pose
    ///
    /// An empty list makes the persister fall back to `kp<index>`.
    fn keypoint_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Optional processor attached to a model, with its own saved artifact
pub trait PostProcessor: Send {
    /// Persist the processor's state under `path`
    fn save(&mut self, path: &Path) -> Result<()>;
}

impl<M: PoseModel + ?Sized> PoseModel for Box<M> {
    fn init(&mut self, frame: &Frame, capture_time: f64) -> Result<bool> {
        (**self).init(frame, capture_time)
    }

    fn infer(&mut self, frame: &Frame, capture_time: f64) -> Result<Pose> {
        (**self).infer(frame, capture_time)
    }

    fn keypoint_names(&self) -> Vec<String> {
        (**self).keypoint_names()
    }
}

/// Column prefix for keypoint `index`
pub fn keypoint_label(names: &[String], index: usize) -> String {
    names
        .get(index)
        .filter(|n| !n.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("kp{}", index))
}
