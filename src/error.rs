//! Error handling for posegate
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the worker, the controller and the persistence layer.

use thiserror::Error;

/// Main error type for posegate operations
#[derive(Error, Debug)]
pub enum PoseError {
    /// The pose model failed while initializing
    #[error("Model error: {0}")]
    Model(String),

    /// The pose model failed while running inference on a frame
    #[error("Inference error: {0}")]
    Inference(String),

    /// Errors related to the worker thread lifecycle
    #[error("Worker error: {0}")]
    Worker(String),

    /// Errors related to command channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// A frame did not match the shape of the shared buffer
    #[error("Frame error: expected {expected} bytes, got {actual}")]
    Frame { expected: usize, actual: usize },

    /// Errors related to the UDP streaming socket
    #[error("Stream error: {0}")]
    Stream(String),

    /// Errors related to persisting the pose history
    #[error("Persist error: {0}")]
    Persist(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV table errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PoseError>,
    },
}

impl PoseError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PoseError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for posegate operations
pub type Result<T> = std::result::Result<T, PoseError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PoseError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PoseError::Io(e).with_context(f()))
    }
}
