//! Result persister
//!
//! Writes the pose history to `<prefix>_pose.csv`: one row per processed
//! frame, three columns per keypoint (`<part>_x`, `<part>_y`,
//! `<part>_confidence`), then `frame_time` and `pose_time`.
//!
//! A configured post-processor saves its own artifact at `<prefix>_proc`.
//! That save is independent: its failure is logged and never changes the
//! outcome of the table write.

use super::history::PoseHistory;
use crate::error::{PoseError, Result, ResultExt};
use crate::worker::model::{keypoint_label, PostProcessor};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix of the pose table file
pub const POSE_TABLE_SUFFIX: &str = "_pose.csv";

/// Suffix of the post-processor artifact
pub const PROCESSOR_SUFFIX: &str = "_proc";

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Table path for a save prefix
pub fn pose_table_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, POSE_TABLE_SUFFIX)
}

/// Post-processor artifact path for a save prefix
pub fn processor_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, PROCESSOR_SUFFIX)
}

/// Column headers for poses with `keypoints` entries
pub fn table_header(names: &[String], keypoints: usize) -> Vec<String> {
    let mut header = Vec::with_capacity(keypoints * 3 + 2);
    for index in 0..keypoints {
        let label = keypoint_label(names, index);
        header.push(format!("{}_x", label));
        header.push(format!("{}_y", label));
        header.push(format!("{}_confidence", label));
    }
    header.push("frame_time".to_string());
    header.push("pose_time".to_string());
    header
}

/// Write the history as a table; returns the path written
pub fn write_pose_table(history: &PoseHistory, names: &[String], prefix: &Path) -> Result<PathBuf> {
    let keypoints = history.poses().first().map(|p| p.len()).unwrap_or(0);
    if let Some((row, pose)) = history
        .poses()
        .iter()
        .enumerate()
        .find(|(_, p)| p.len() != keypoints)
    {
        return Err(PoseError::Persist(format!(
            "row {} has {} keypoints, expected {}",
            row,
            pose.len(),
            keypoints
        )));
    }

    let path = pose_table_path(prefix);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(table_header(names, keypoints))?;

    let mut record = Vec::with_capacity(keypoints * 3 + 2);
    for (pose, frame_time, pose_time) in history.rows() {
        record.clear();
        for kp in pose.keypoints() {
            record.push(kp.x.to_string());
            record.push(kp.y.to_string());
            record.push(kp.confidence.to_string());
        }
        record.push(frame_time.to_string());
        record.push(pose_time.to_string());
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;

    Ok(path)
}

/// Save the history under `prefix`, clearing it only on success
///
/// Returns `false` without touching disk when the history is empty.
pub fn save_history(
    history: &mut PoseHistory,
    names: &[String],
    processor: Option<&mut dyn PostProcessor>,
    prefix: &Path,
) -> bool {
    if history.is_empty() {
        tracing::debug!("Nothing to save for {}", prefix.display());
        return false;
    }

    let saved = match write_pose_table(history, names, prefix) {
        Ok(path) => {
            tracing::info!("Saved {} to {}", history.summary(), path.display());
            true
        }
        Err(e) => {
            tracing::error!("Failed to save pose table for {}: {}", prefix.display(), e);
            false
        }
    };

    if let Some(processor) = processor {
        let proc_path = processor_path(prefix);
        if let Err(e) = processor.save(&proc_path) {
            tracing::error!(
                "Post-processor failed to save {}: {}",
                proc_path.display(),
                e
            );
        }
    }

    if saved {
        history.clear();
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pose;

    struct FailingProcessor;

    impl PostProcessor for FailingProcessor {
        fn save(&mut self, _path: &Path) -> Result<()> {
            Err(PoseError::Persist("processor broke".into()))
        }
    }

    fn sample_history(rows: usize) -> PoseHistory {
        let mut history = PoseHistory::new();
        for i in 0..rows {
            let t = i as f64;
            history.push(
                Pose::from_rows(&[(t, t + 1.0, 0.9), (t + 2.0, t + 3.0, 0.8)]),
                t + 0.05,
                t,
            );
        }
        history
    }

    #[test]
    fn test_paths() {
        let prefix = Path::new("/data/run1");
        assert_eq!(pose_table_path(prefix), PathBuf::from("/data/run1_pose.csv"));
        assert_eq!(processor_path(prefix), PathBuf::from("/data/run1_proc"));
    }

    #[test]
    fn test_header_layout() {
        let names = vec!["nose".to_string()];
        assert_eq!(
            table_header(&names, 2),
            vec![
                "nose_x",
                "nose_y",
                "nose_confidence",
                "kp1_x",
                "kp1_y",
                "kp1_confidence",
                "frame_time",
                "pose_time"
            ]
        );
    }

    #[test]
    fn test_save_writes_rows_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("session");
        let mut history = sample_history(3);

        assert!(save_history(&mut history, &[], None, &prefix));
        assert!(history.is_empty());

        let mut reader = csv::Reader::from_path(pose_table_path(&prefix)).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 8);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][0], "1");
        assert_eq!(&rows[1][6], "1");
        assert_eq!(&rows[1][7], "1.05");
    }

    #[test]
    fn test_empty_history_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("empty");
        let mut history = PoseHistory::new();
        assert!(!save_history(&mut history, &[], None, &prefix));
        assert!(!pose_table_path(&prefix).exists());
    }

    #[test]
    fn test_failed_write_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing_dir").join("session");
        let mut history = sample_history(2);
        assert!(!save_history(&mut history, &[], None, &prefix));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_ragged_poses_rejected() {
        let mut history = sample_history(1);
        history.push(Pose::from_rows(&[(0.0, 0.0, 0.0)]), 2.0, 2.0);
        let dir = tempfile::tempdir().unwrap();
        let err = write_pose_table(&history, &[], &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, PoseError::Persist(_)));
    }

    #[test]
    fn test_processor_failure_does_not_fail_save() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("with_proc");
        let mut history = sample_history(1);
        let mut processor = FailingProcessor;
        assert!(save_history(
            &mut history,
            &[],
            Some(&mut processor),
            &prefix
        ));
        assert!(history.is_empty());
    }
}
