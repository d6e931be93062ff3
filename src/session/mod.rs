//! Pose history and persistence
//!
//! While recording is enabled the worker appends every processed pose to a
//! [`PoseHistory`]. A save request writes the history as a table and clears
//! it on success.

pub mod history;
pub mod persister;

pub use history::PoseHistory;
pub use persister::{
    pose_table_path, processor_path, save_history, table_header, write_pose_table,
    POSE_TABLE_SUFFIX, PROCESSOR_SUFFIX,
};
