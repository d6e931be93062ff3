//! Message passing between the controller and its workers
//!
//! - [`CommandChannel`] - Bounded duplex command link shared by all workers
//! - [`Command`] / [`PoseCommand`] - Domain-tagged commands and the pose worker's decoded view
//! - [`DisplayQueue`] - Latest-wins queue feeding live display

pub mod command;
pub mod display;
pub mod duplex;

pub use command::{Arg, Command, Domain, PoseCommand, Verb};
pub use display::{DisplayQueue, DISPLAY_QUEUE_CAPACITY};
pub use duplex::{
    CommandChannel, CommandQueue, Route, DEFAULT_CHANNEL_CAPACITY, DEFAULT_WRITE_TIMEOUT,
};
